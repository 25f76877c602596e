use std::time::Duration;

use super::{
	MAX_READ_SIZE,
	MAX_WRITE_SIZE,
	SlaveAddress,
	Speed,
};
use super::report::{
	Command,
	DecodeError,
	Reply,
	Response,
};
use crate::eeprom::AddressWidth;
use crate::error::EepromError;
use crate::transport::Transport;

/// Waits between sending a command and reading its response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Timing {
	pub step: Duration,
	/// after a repeated start read, the bridge has to clock in the data
	pub repeated_start: Duration,
	/// used instead of `step` after a write; covers the chip's write cycle
	pub page_write: Duration,
	/// after cancelling a transfer that was still in flight
	pub cancel_settle: Duration,
}

impl Timing {
	pub fn none() -> Self {
		Timing {
			step: Duration::from_millis(0),
			repeated_start: Duration::from_millis(0),
			page_write: Duration::from_millis(0),
			cancel_settle: Duration::from_millis(0),
		}
	}
}

impl Default for Timing {
	fn default() -> Self {
		Timing {
			step: Duration::from_millis(50),
			repeated_start: Duration::from_millis(100),
			page_write: Duration::from_millis(50),
			cancel_settle: Duration::from_secs(1),
		}
	}
}

/// Bus parameters of a configured bridge with a responding slave.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeviceSession {
	divider: u8,
	slave: SlaveAddress,
	address_width: AddressWidth,
}

impl DeviceSession {
	pub fn divider(&self) -> u8 {
		self.divider
	}

	pub fn slave(&self) -> SlaveAddress {
		self.slave
	}

	pub fn address_width(&self) -> AddressWidth {
		self.address_width
	}
}

/// Runs bridge transactions one report pair at a time.
///
/// Every failed transaction is followed by a cancel so the bridge releases
/// the bus; nothing is retried.
pub struct I2cEngine<T: Transport> {
	transport: T,
	timing: Timing,
}

impl<T: Transport> I2cEngine<T> {
	pub fn new(transport: T, timing: Timing) -> Self {
		I2cEngine {
			transport,
			timing,
		}
	}

	pub fn into_transport(self) -> T {
		self.transport
	}

	fn exchange(&mut self, command: &Command, settle: Duration) -> crate::AResult<Response> {
		let request = command.encode();
		trace!("{} -> {:?}", command.name(), request);
		self.transport.send(&request)?;
		self.transport.delay(settle);
		let response = self.transport.receive()?;
		trace!("{} <- {:?}", command.name(), response);
		Ok(response)
	}

	// outer error: transport broke; inner error: bridge said no
	fn transact(&mut self, command: &Command, settle: Duration) -> crate::AResult<Result<Reply, DecodeError>> {
		let response = self.exchange(command, settle)?;
		Ok(command.decode(&response))
	}

	/// Cancel whatever the bridge is doing on the bus.
	pub fn cancel(&mut self) -> crate::AResult<()> {
		let response = self.exchange(&Command::Cancel, self.timing.step)?;
		if let Err(e) = Command::Cancel.decode(&response) {
			warn!("bridge didn't acknowledge cancel: {}", e);
		}
		if response.cancel_in_flight() {
			warn!("cancelled i2c transfer in progress, waiting for the bridge to settle");
			self.transport.delay(self.timing.cancel_settle);
		} else {
			debug!("i2c bus was idle");
		}
		Ok(())
	}

	// cancel, then hand back the original failure
	fn abort(&mut self, e: EepromError) -> failure::Error {
		if let Err(cancel_err) = self.cancel() {
			warn!("cancel after failure didn't go through: {}", cancel_err);
		}
		e.into()
	}

	/// Set the I2C clock; returns the divider the bridge took.
	pub fn configure(&mut self, speed: Speed) -> crate::AResult<u8> {
		let divider = speed.divider();
		debug!("setting i2c speed {} (divider {})", speed, divider);
		match self.transact(&Command::SetSpeed { divider }, self.timing.step)? {
			Ok(_) => Ok(divider),
			Err(cause) => Err(self.abort(EepromError::Configuration { divider, cause })),
		}
	}

	/// Whether something ACKs `slave`. Not finding it isn't an error here.
	pub fn probe(&mut self, slave: SlaveAddress) -> crate::AResult<bool> {
		let step = self.timing.step;
		let result = match self.transact(&Command::Probe { slave }, step)? {
			Ok(_) => self.transact(&Command::GetData, step)?,
			Err(e) => Err(e),
		};
		match result {
			Ok(_) => Ok(true),
			Err(e) => {
				debug!("probing slave {}: {}", slave, e);
				self.cancel()?;
				Ok(false)
			},
		}
	}

	/// Configure the clock and make sure the EEPROM answers.
	pub fn connect(mut self, speed: Speed, slave: SlaveAddress, address_width: AddressWidth) -> crate::AResult<Session<T>> {
		let divider = self.configure(speed)?;
		if !self.probe(slave)? {
			return Err(EepromError::DeviceNotFound { slave: slave.get() }.into());
		}
		info!("found i2c eeprom ({})", slave);

		Ok(Session {
			engine: self,
			device: DeviceSession {
				divider,
				slave,
				address_width,
			},
		})
	}
}

/// Segment I/O against a connected EEPROM.
pub struct Session<T: Transport> {
	engine: I2cEngine<T>,
	device: DeviceSession,
}

impl<T: Transport> Session<T> {
	pub fn device(&self) -> &DeviceSession {
		&self.device
	}

	pub fn into_transport(self) -> T {
		self.engine.into_transport()
	}

	/// Write a segment that doesn't cross a page boundary.
	pub fn write_segment(&mut self, address: usize, data: &[u8]) -> crate::AResult<()> {
		assert!(data.len() <= MAX_WRITE_SIZE);
		let command = Command::Write {
			slave: self.device.slave,
			width: self.device.address_width,
			address,
			data,
		};
		let settle = self.engine.timing.page_write;
		match self.engine.transact(&command, settle)? {
			Ok(_) => Ok(()),
			Err(cause) => Err(self.engine.abort(EepromError::Transfer {
				command: command.name(),
				address,
				cause,
			})),
		}
	}

	/// Random read: set the word address, repeated start, fetch the data.
	pub fn read_segment(&mut self, address: usize, length: usize) -> crate::AResult<Vec<u8>> {
		assert!(length <= MAX_READ_SIZE);
		let slave = self.device.slave;
		let timing = self.engine.timing;
		let steps = [
			(Command::ReadNoStop { slave, width: self.device.address_width, address }, timing.step),
			(Command::ReadRepeatedStart { slave, length: length as u16 }, timing.repeated_start),
			(Command::GetData, timing.step),
		];

		let mut data = Vec::new();
		for (command, settle) in steps.iter() {
			match self.engine.transact(command, *settle)? {
				Ok(Reply::Data(d)) => data = d,
				Ok(_) => (),
				Err(cause) => return Err(self.engine.abort(EepromError::Transfer {
					command: command.name(),
					address,
					cause,
				})),
			}
		}

		if data.len() != length {
			return Err(self.engine.abort(EepromError::Transfer {
				command: Command::GetData.name(),
				address,
				cause: DecodeError::Short { expected: length, actual: data.len() },
			}));
		}
		Ok(data)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;

	use super::*;
	use crate::eeprom::{
		Capacity,
		EepromGeometry,
	};
	use crate::mcp2221::report::{
		Request,
		GET_I2C_DATA,
		I2C_READ_DATA_REPEATED_START,
		I2C_WRITE_DATA,
		I2C_WRITE_DATA_NO_STOP,
		STATUS_SET_PARAMETERS,
	};
	use crate::mcp2221::simulator::{
		Fault,
		SimulatedBridge,
	};

	fn bridge(kbit: u32) -> SimulatedBridge {
		let geometry = EepromGeometry::new(Capacity::from_kbit(kbit).unwrap(), 8, AddressWidth::Eight).unwrap();
		SimulatedBridge::new(&geometry, SlaveAddress::DEFAULT)
	}

	fn connect(sim: &mut SimulatedBridge) -> Session<&mut SimulatedBridge> {
		let width = sim.address_width();
		I2cEngine::new(sim, Timing::default())
			.connect(Speed::Fast, SlaveAddress::DEFAULT, width)
			.unwrap()
	}

	fn kind(e: &failure::Error) -> &EepromError {
		e.downcast_ref::<EepromError>().expect("not an EepromError")
	}

	#[test]
	fn connect_configures_and_finds_slave() {
		let mut sim = bridge(2);
		let session = connect(&mut sim);
		assert_eq!(session.device().divider(), 28);
		drop(session);
		assert_eq!(sim.divider(), Some(28));
		assert_eq!(sim.cancels(), 0);
	}

	#[test]
	fn rejected_divider_is_fatal() {
		let mut sim = bridge(2);
		sim.inject(STATUS_SET_PARAMETERS, 0, Fault::Nack);
		let err = I2cEngine::new(&mut sim, Timing::none())
			.connect(Speed::Standard, SlaveAddress::DEFAULT, AddressWidth::Eight)
			.err().unwrap();
		match kind(&err) {
			EepromError::Configuration { divider: 118, .. } => (),
			other => panic!("unexpected {:?}", other),
		}
		assert_eq!(sim.cancels(), 1);
	}

	#[test]
	fn absent_slave_is_reported() {
		let mut sim = bridge(2);
		let err = I2cEngine::new(&mut sim, Timing::default())
			.connect(Speed::Fast, SlaveAddress::new(0x51).unwrap(), AddressWidth::Eight)
			.err().unwrap();
		match kind(&err) {
			EepromError::DeviceNotFound { slave: 0x51 } => (),
			other => panic!("unexpected {:?}", other),
		}
		assert_eq!(sim.cancels(), 1);
		// the presence check left a transfer hanging, so the cancel has to settle
		assert!(sim.delays().contains(&Duration::from_secs(1)));
	}

	#[test]
	fn not_ready_slave_counts_as_absent() {
		let mut sim = bridge(2);
		sim.inject(GET_I2C_DATA, 0, Fault::NotReady);
		let mut engine = I2cEngine::new(&mut sim, Timing::none());
		engine.configure(Speed::Fast).unwrap();
		assert!(!engine.probe(SlaveAddress::DEFAULT).unwrap());
		drop(engine);
		assert_eq!(sim.cancels(), 1);
	}

	#[test]
	fn write_nack_cancels_once() {
		let mut sim = bridge(2);
		sim.inject(I2C_WRITE_DATA, 0, Fault::Nack);
		let mut session = connect(&mut sim);
		let err = session.write_segment(0x10, &[1, 2, 3]).unwrap_err();
		assert!(kind(&err).is_transfer());
		drop(session);
		assert_eq!(sim.cancels(), 1);
		assert!(sim.delays().contains(&Duration::from_secs(1)));
		assert_eq!(&sim.memory()[0x10..0x13], &[0xff, 0xff, 0xff]);
	}

	#[test]
	fn wrong_echo_on_any_read_step_cancels_once() {
		for &code in [I2C_WRITE_DATA_NO_STOP, I2C_READ_DATA_REPEATED_START, GET_I2C_DATA].iter() {
			let mut sim = bridge(2);
			// GET_I2C_DATA occurrence 0 belongs to the presence check
			let nth = if code == GET_I2C_DATA { 1 } else { 0 };
			sim.inject(code, nth, Fault::WrongEcho);
			let mut session = connect(&mut sim);
			let err = session.read_segment(0, 16).unwrap_err();
			assert!(kind(&err).is_transfer(), "code 0x{:02x}", code);
			drop(session);
			assert_eq!(sim.cancels(), 1, "code 0x{:02x}", code);
		}
	}

	#[test]
	fn not_ready_data_is_failure() {
		let mut sim = bridge(2);
		sim.inject(GET_I2C_DATA, 1, Fault::NotReady);
		let mut session = connect(&mut sim);
		let err = session.read_segment(0, 8).unwrap_err();
		match kind(&err) {
			EepromError::Transfer { cause: DecodeError::NotReady, .. } => (),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn silent_bridge_goes_through_recovery() {
		let mut sim = bridge(2);
		sim.inject(I2C_WRITE_DATA, 0, Fault::Silent);
		let mut session = connect(&mut sim);
		let err = session.write_segment(0, &[0]).unwrap_err();
		match kind(&err) {
			EepromError::Transfer { cause: DecodeError::Echo { actual: 0, .. }, .. } => (),
			other => panic!("unexpected {:?}", other),
		}
		drop(session);
		assert_eq!(sim.cancels(), 1);
	}

	#[test]
	fn segments_use_16bit_addresses_on_large_chips() {
		let mut sim = bridge(64);
		let mut session = connect(&mut sim);
		assert_eq!(session.device().address_width(), AddressWidth::Sixteen);
		session.write_segment(0x1234, &[0xaa, 0xbb]).unwrap();
		assert_eq!(session.read_segment(0x1233, 4).unwrap(), vec![0xff, 0xaa, 0xbb, 0xff]);
		drop(session);
		let write = sim.requests().iter().find(|r| r.code() == I2C_WRITE_DATA).unwrap();
		assert_eq!(&write.body()[..8], &[0x90, 4, 0, 0xa0, 0x12, 0x34, 0xaa, 0xbb]);
	}

	#[test]
	fn write_waits_for_page_cycle() {
		let mut sim = bridge(2);
		let timing = Timing { page_write: Duration::from_millis(7), ..Timing::none() };
		let mut session = I2cEngine::new(&mut sim, timing)
			.connect(Speed::Fast, SlaveAddress::DEFAULT, AddressWidth::Eight)
			.unwrap();
		session.write_segment(0, &[1]).unwrap();
		drop(session);
		assert_eq!(sim.delays().last(), Some(&Duration::from_millis(7)));
	}

	#[test]
	fn nack_on_any_read_step_cancels_once() {
		for &code in [I2C_WRITE_DATA_NO_STOP, I2C_READ_DATA_REPEATED_START, GET_I2C_DATA].iter() {
			let mut sim = bridge(2);
			let nth = if code == GET_I2C_DATA { 1 } else { 0 };
			sim.inject(code, nth, Fault::Nack);
			let mut session = connect(&mut sim);
			let err = session.read_segment(0x20, 12).unwrap_err();
			match kind(&err) {
				EepromError::Transfer { address: 0x20, cause: DecodeError::Status(0x01), .. } => (),
				other => panic!("code 0x{:02x}: unexpected {:?}", code, other),
			}
			drop(session);
			assert_eq!(sim.cancels(), 1, "code 0x{:02x}", code);
		}
	}

	/// Replays canned responses, one per request.
	struct Scripted {
		responses: VecDeque<Response>,
		delays: Vec<Duration>,
	}

	impl Scripted {
		fn new(responses: Vec<Vec<u8>>) -> Self {
			Scripted {
				responses: responses.iter().map(|r| Response::from_slice(r)).collect(),
				delays: Vec::new(),
			}
		}
	}

	impl Transport for Scripted {
		fn send(&mut self, _request: &Request) -> crate::AResult<()> {
			Ok(())
		}

		fn receive(&mut self) -> crate::AResult<Response> {
			Ok(self.responses.pop_front().unwrap_or_else(|| Response::from_slice(&[])))
		}

		fn delay(&mut self, duration: Duration) {
			self.delays.push(duration);
		}
	}

	#[test]
	fn cancel_settles_on_in_flight_status_alone() {
		let timing = Timing::default();
		let mut script = Scripted::new(vec![vec![0x10, 0x01, 0x10]]);
		I2cEngine::new(&mut script, timing).cancel().unwrap();
		assert_eq!(script.delays, vec![timing.step, timing.cancel_settle]);

		let mut script = Scripted::new(vec![vec![0x10, 0x00, 0x10]]);
		I2cEngine::new(&mut script, timing).cancel().unwrap();
		assert_eq!(script.delays, vec![timing.step, timing.cancel_settle]);
	}

	#[test]
	fn cancel_on_idle_bus_doesnt_settle() {
		let timing = Timing::default();
		let mut script = Scripted::new(vec![vec![0x10, 0x00, 0x11]]);
		I2cEngine::new(&mut script, timing).cancel().unwrap();
		assert_eq!(script.delays, vec![timing.step]);

		let mut script = Scripted::new(vec![]);
		I2cEngine::new(&mut script, timing).cancel().unwrap();
		assert_eq!(script.delays, vec![timing.step]);
	}
}
