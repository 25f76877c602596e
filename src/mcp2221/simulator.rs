//! In-memory stand-in for a bridge with a 24Cxx EEPROM behind it.
//!
//! Only the behaviour the engine depends on is modelled: echo/status bytes,
//! the read buffer handed out by "get I2C data", page wrap-around on writes
//! and the "transfer in flight" state that a cancel clears. Faults can be
//! injected per command code. Delays are recorded, never slept.

use std::collections::HashMap;
use std::time::Duration;

use super::SlaveAddress;
use super::report::*;
use crate::eeprom::{
	AddressWidth,
	EepromGeometry,
};
use crate::transport::Transport;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fault {
	/// non-zero status, transfer left hanging
	Nack,
	WrongEcho,
	/// length field reads 127
	NotReady,
	/// no response report at all
	Silent,
}

pub struct SimulatedBridge {
	memory: Vec<u8>,
	page_size: usize,
	address_width: AddressWidth,
	slave: SlaveAddress,
	divider: Option<u8>,
	pointer: usize,
	buffer: Option<Vec<u8>>,
	in_flight: bool,
	pending: Option<Response>,
	faults: HashMap<(u8, usize), Fault>,
	seen: HashMap<u8, usize>,
	requests: Vec<Request>,
	delays: Vec<Duration>,
}

impl SimulatedBridge {
	/// An erased (all `0xff`) EEPROM answering at `slave`.
	pub fn new(geometry: &EepromGeometry, slave: SlaveAddress) -> Self {
		SimulatedBridge {
			memory: vec![0xff; geometry.total_size()],
			page_size: geometry.page_size(),
			address_width: geometry.address_width(),
			slave,
			divider: None,
			pointer: 0,
			buffer: None,
			in_flight: false,
			pending: None,
			faults: HashMap::new(),
			seen: HashMap::new(),
			requests: Vec::new(),
			delays: Vec::new(),
		}
	}

	pub fn with_memory(mut self, memory: Vec<u8>) -> Self {
		assert_eq!(memory.len(), self.memory.len());
		self.memory = memory;
		self
	}

	/// Answer the `nth` (counting from 0) command with `code` with `fault`.
	pub fn inject(&mut self, code: u8, nth: usize, fault: Fault) {
		self.faults.insert((code, nth), fault);
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn address_width(&self) -> AddressWidth {
		self.address_width
	}

	pub fn divider(&self) -> Option<u8> {
		self.divider
	}

	pub fn requests(&self) -> &[Request] {
		&self.requests
	}

	pub fn delays(&self) -> &[Duration] {
		&self.delays
	}

	pub fn cancels(&self) -> usize {
		self.requests.iter()
			.filter(|r| r.code() == STATUS_SET_PARAMETERS && r.body()[2] == CANCEL_TRANSFER)
			.count()
	}

	fn word_address(&self, body: &[u8]) -> usize {
		match self.address_width {
			AddressWidth::Eight => body[TRANSFER_HEADER] as usize,
			AddressWidth::Sixteen => (body[TRANSFER_HEADER] as usize) << 8 | body[TRANSFER_HEADER + 1] as usize,
		}
	}

	fn addressed(&self, byte: u8) -> bool {
		byte >> 1 == self.slave.get() && !self.in_flight
	}

	fn clock_in(&mut self, length: usize) {
		let size = self.memory.len();
		let data = (0..length).map(|i| self.memory[(self.pointer + i) % size]).collect();
		self.pointer = (self.pointer + length) % size;
		self.buffer = Some(data);
	}

	// a NACK on the bus: the bridge keeps the transfer open until cancelled
	fn nack(&mut self, response: &mut [u8]) {
		self.in_flight = true;
		self.buffer = None;
		response[1] = 0x01;
	}

	fn execute(&mut self, body: &[u8]) -> [u8; REPORT_SIZE] {
		let mut r = [0u8; REPORT_SIZE];
		r[0] = body[0];
		let length = body[1] as usize | (body[2] as usize) << 8;

		match body[0] {
			STATUS_SET_PARAMETERS => {
				if body[2] == CANCEL_TRANSFER {
					r[2] = if self.in_flight { CANCEL_IN_FLIGHT } else { CANCEL_IDLE };
					self.in_flight = false;
					self.buffer = None;
				}
				if body[3] == SET_DIVIDER {
					self.divider = Some(body[4]);
					r[3] = SET_DIVIDER;
					r[4] = body[4];
				}
			},
			I2C_READ_DATA => {
				if self.addressed(body[3]) {
					self.clock_in(length);
				} else {
					// address NACK only shows up when fetching the data
					self.in_flight = true;
					self.buffer = None;
				}
			},
			I2C_WRITE_DATA => {
				if !self.addressed(body[3]) {
					self.nack(&mut r);
				} else {
					let address = self.word_address(body);
					let header = TRANSFER_HEADER + self.address_width.bytes();
					let data = &body[header..TRANSFER_HEADER + length];
					let size = self.memory.len();
					let page_start = address - address % self.page_size;
					for (i, b) in data.iter().enumerate() {
						// chip wraps at the end of its page buffer
						let target = page_start + (address % self.page_size + i) % self.page_size;
						self.memory[target % size] = *b;
					}
				}
			},
			I2C_WRITE_DATA_NO_STOP => {
				if !self.addressed(body[3]) {
					self.nack(&mut r);
				} else {
					self.pointer = self.word_address(body) % self.memory.len();
				}
			},
			I2C_READ_DATA_REPEATED_START => {
				if !self.addressed(body[3]) {
					self.nack(&mut r);
				} else {
					self.clock_in(length);
				}
			},
			GET_I2C_DATA => {
				match self.buffer.take() {
					Some(ref data) if !self.in_flight => {
						r[3] = data.len() as u8;
						r[4..4 + data.len()].copy_from_slice(data);
					},
					_ => {
						r[1] = 0x41;
						r[3] = DATA_NOT_READY;
					},
				}
			},
			_ => {
				r[1] = 0xff;
			},
		}
		r
	}

	fn respond(&mut self, body: &[u8], fault: Fault) -> Option<[u8; REPORT_SIZE]> {
		let mut r = [0u8; REPORT_SIZE];
		r[0] = body[0];
		self.in_flight = true;
		self.buffer = None;
		match fault {
			Fault::Nack => r[1] = 0x01,
			Fault::WrongEcho => r[0] = 0x55,
			Fault::NotReady => r[3] = DATA_NOT_READY,
			Fault::Silent => return None,
		}
		Some(r)
	}
}

impl Transport for SimulatedBridge {
	fn send(&mut self, request: &Request) -> crate::AResult<()> {
		self.requests.push(*request);
		let body = request.body();
		let code = body[0];
		let nth = {
			let n = self.seen.entry(code).or_insert(0);
			*n += 1;
			*n - 1
		};

		let response = match self.faults.get(&(code, nth)).cloned() {
			Some(fault) => self.respond(body, fault),
			None => Some(self.execute(body)),
		};
		self.pending = response.map(|r| Response::from_slice(&r));
		Ok(())
	}

	fn receive(&mut self) -> crate::AResult<Response> {
		Ok(self.pending.take().unwrap_or_else(|| Response::from_slice(&[])))
	}

	fn delay(&mut self, duration: Duration) {
		self.delays.push(duration);
	}
}
