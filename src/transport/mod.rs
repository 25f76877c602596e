use std::thread;
use std::time::{
	Duration,
	Instant,
};

use crate::mcp2221::report::{
	Request,
	Response,
};

mod hid;

pub use self::hid::{
	BridgeInfo,
	DeviceSelector,
	HidTransport,
	list_bridges,
	select_bridge,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

/// One report out, one report in; both block.
pub trait Transport {
	fn send(&mut self, request: &Request) -> crate::AResult<()>;
	fn receive(&mut self) -> crate::AResult<Response>;

	// wait for (at least) `duration`; the bridge needs time between a
	// command and its response
	fn delay(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

impl<T: Transport + ?Sized> Transport for &mut T {
	fn send(&mut self, request: &Request) -> crate::AResult<()> {
		(**self).send(request)
	}

	fn receive(&mut self) -> crate::AResult<Response> {
		(**self).receive()
	}

	fn delay(&mut self, duration: Duration) {
		(**self).delay(duration)
	}
}
