//! MCP2221 HID report layouts.
//!
//! Outgoing reports carry the HID report id (always 0) in front of the 64
//! command bytes; incoming reports are the bare 64 bytes. Offsets below are
//! relative to the command byte.

use std::fmt;

use super::SlaveAddress;
use crate::eeprom::AddressWidth;

pub const REPORT_SIZE: usize = 64;

#[allow(dead_code)]
mod consts {
	// command codes
	pub const STATUS_SET_PARAMETERS: u8 = 0x10;
	pub const GET_I2C_DATA: u8 = 0x40;
	pub const I2C_WRITE_DATA: u8 = 0x90;
	pub const I2C_READ_DATA: u8 = 0x91;
	pub const I2C_READ_DATA_REPEATED_START: u8 = 0x93;
	pub const I2C_WRITE_DATA_NO_STOP: u8 = 0x94;

	// STATUS_SET_PARAMETERS flags
	pub const CANCEL_TRANSFER: u8 = 0x10; // request byte 2
	pub const SET_DIVIDER: u8 = 0x20; // request byte 3, echoed in response byte 3

	// response byte 2 of a cancel: transfer was marked for cancellation
	pub const CANCEL_IN_FLIGHT: u8 = 0x10;
	// response byte 2 of a cancel: bus was already idle
	pub const CANCEL_IDLE: u8 = 0x11;

	// GET_I2C_DATA length field when the chip has no data to hand out
	pub const DATA_NOT_READY: u8 = 127;

	// header in front of address/data for I2C write and read commands
	pub const TRANSFER_HEADER: usize = 4;
}

pub use self::consts::*;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Request([u8; REPORT_SIZE + 1]);

impl Request {
	fn new(code: u8) -> Self {
		let mut report = [0u8; REPORT_SIZE + 1];
		report[1] = code;
		Request(report)
	}

	/// bytes to hand to the HID layer, including the report id
	pub fn as_bytes(&self) -> &[u8] {
		&self.0[..]
	}

	/// command bytes without the report id
	pub fn body(&self) -> &[u8] {
		&self.0[1..]
	}

	fn body_mut(&mut self) -> &mut [u8] {
		&mut self.0[1..]
	}

	pub fn code(&self) -> u8 {
		self.0[1]
	}
}

impl fmt::Debug for Request {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Request(")?;
		for b in &self.body()[..8] {
			write!(f, " {:02x}", b)?;
		}
		write!(f, " ..)")
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Response([u8; REPORT_SIZE]);

impl Response {
	/// Short input is zero padded, so an empty read decodes as a failure.
	pub fn from_slice(data: &[u8]) -> Self {
		let mut report = [0u8; REPORT_SIZE];
		let len = data.len().min(REPORT_SIZE);
		report[..len].copy_from_slice(&data[..len]);
		Response(report)
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0[..]
	}

	/// Cancel status byte says a transfer was still running, whether or
	/// not the rest of the response checks out.
	pub fn cancel_in_flight(&self) -> bool {
		self.0[2] == CANCEL_IN_FLIGHT
	}
}

impl fmt::Debug for Response {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Response(")?;
		for b in &self.0[..8] {
			write!(f, " {:02x}", b)?;
		}
		write!(f, " ..)")
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Fail)]
pub enum DecodeError {
	#[fail(display = "response echoes command 0x{:02x} instead of 0x{:02x}", actual, expected)]
	Echo {
		expected: u8,
		actual: u8,
	},
	#[fail(display = "bridge reported status 0x{:02x}", _0)]
	Status(u8),
	#[fail(display = "bridge didn't take clock divider (flag 0x{:02x}, divider {})", flag, divider)]
	Divider {
		flag: u8,
		divider: u8,
	},
	#[fail(display = "i2c data not ready")]
	NotReady,
	#[fail(display = "invalid i2c data length {}", _0)]
	Length(u8),
	#[fail(display = "got {} of {} requested bytes", actual, expected)]
	Short {
		expected: usize,
		actual: usize,
	},
}

/// One bridge command with its parameters.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command<'a> {
	SetSpeed {
		divider: u8,
	},
	Cancel,
	/// one byte read, only to see whether somebody ACKs the address
	Probe {
		slave: SlaveAddress,
	},
	GetData,
	Write {
		slave: SlaveAddress,
		width: AddressWidth,
		address: usize,
		data: &'a [u8],
	},
	/// write the word address but keep the bus for a repeated start
	ReadNoStop {
		slave: SlaveAddress,
		width: AddressWidth,
		address: usize,
	},
	ReadRepeatedStart {
		slave: SlaveAddress,
		length: u16,
	},
}

/// Decoded fields of a successful response.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Reply {
	Done,
	Speed {
		divider: u8,
	},
	Cancelled {
		in_flight: bool,
	},
	Data(Vec<u8>),
}

impl<'a> Command<'a> {
	pub fn code(&self) -> u8 {
		match self {
			Command::SetSpeed { .. } | Command::Cancel => STATUS_SET_PARAMETERS,
			Command::Probe { .. } => I2C_READ_DATA,
			Command::GetData => GET_I2C_DATA,
			Command::Write { .. } => I2C_WRITE_DATA,
			Command::ReadNoStop { .. } => I2C_WRITE_DATA_NO_STOP,
			Command::ReadRepeatedStart { .. } => I2C_READ_DATA_REPEATED_START,
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			Command::SetSpeed { .. } => "set speed",
			Command::Cancel => "cancel",
			Command::Probe { .. } => "probe",
			Command::GetData => "get data",
			Command::Write { .. } => "write",
			Command::ReadNoStop { .. } => "write address",
			Command::ReadRepeatedStart { .. } => "read repeated start",
		}
	}

	pub fn encode(&self) -> Request {
		let mut request = Request::new(self.code());
		let body = request.body_mut();
		match *self {
			Command::SetSpeed { divider } => {
				body[3] = SET_DIVIDER;
				body[4] = divider;
			},
			Command::Cancel => {
				body[2] = CANCEL_TRANSFER;
			},
			Command::Probe { slave } => {
				body[1] = 1;
				body[3] = slave.read_byte();
			},
			Command::GetData => (),
			Command::Write { slave, width, address, data } => {
				let end = put_transfer_header(body, slave, width, address, data.len());
				assert!(end + data.len() <= REPORT_SIZE);
				body[end..end + data.len()].copy_from_slice(data);
			},
			Command::ReadNoStop { slave, width, address } => {
				put_transfer_header(body, slave, width, address, 0);
			},
			Command::ReadRepeatedStart { slave, length } => {
				body[1] = length as u8;
				body[2] = (length >> 8) as u8;
				body[3] = slave.read_byte();
			},
		}
		request
	}

	/// Check the response belongs to this command and completed; extract
	/// the fields the caller needs.
	pub fn decode(&self, response: &Response) -> Result<Reply, DecodeError> {
		let r = response.as_bytes();
		if r[0] != self.code() {
			return Err(DecodeError::Echo { expected: self.code(), actual: r[0] });
		}
		if r[1] != 0 {
			return Err(DecodeError::Status(r[1]));
		}

		match *self {
			Command::SetSpeed { divider } => {
				if r[3] != SET_DIVIDER || r[4] != divider {
					return Err(DecodeError::Divider { flag: r[3], divider: r[4] });
				}
				Ok(Reply::Speed { divider })
			},
			Command::Cancel => Ok(Reply::Cancelled { in_flight: r[2] == CANCEL_IN_FLIGHT }),
			Command::GetData => {
				let length = r[3];
				if length == DATA_NOT_READY {
					return Err(DecodeError::NotReady);
				}
				let length = length as usize;
				if length > super::MAX_READ_SIZE {
					return Err(DecodeError::Length(r[3]));
				}
				Ok(Reply::Data(r[4..4 + length].to_vec()))
			},
			_ => Ok(Reply::Done),
		}
	}
}

// length (LE), slave, word address; returns offset of the data
fn put_transfer_header(body: &mut [u8], slave: SlaveAddress, width: AddressWidth, address: usize, data_len: usize) -> usize {
	let (address_bytes, address_len) = width.encode(address);
	let total = address_len + data_len;
	body[1] = total as u8;
	body[2] = (total >> 8) as u8;
	body[3] = slave.write_byte();
	body[TRANSFER_HEADER..TRANSFER_HEADER + address_len].copy_from_slice(&address_bytes[..address_len]);
	TRANSFER_HEADER + address_len
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(bytes: &[u8]) -> Response {
		Response::from_slice(bytes)
	}

	#[test]
	fn set_speed_layout() {
		let request = Command::SetSpeed { divider: 28 }.encode();
		assert_eq!(request.as_bytes().len(), 65);
		assert_eq!(&request.as_bytes()[..6], &[0x00, 0x10, 0x00, 0x00, 0x20, 28]);
		assert!(request.as_bytes()[6..].iter().all(|&b| b == 0));
	}

	#[test]
	fn cancel_layout() {
		let request = Command::Cancel.encode();
		assert_eq!(&request.as_bytes()[..6], &[0x00, 0x10, 0x00, 0x10, 0x00, 0x00]);
	}

	#[test]
	fn presence_check_layout() {
		let request = Command::Probe { slave: SlaveAddress::DEFAULT }.encode();
		assert_eq!(&request.as_bytes()[..5], &[0x00, 0x91, 0x01, 0x00, 0xa1]);
	}

	#[test]
	fn write_layout_16bit() {
		let request = Command::Write {
			slave: SlaveAddress::DEFAULT,
			width: AddressWidth::Sixteen,
			address: 0x1234,
			data: &[0xde, 0xad, 0xbe],
		}.encode();
		assert_eq!(&request.body()[..9], &[0x90, 5, 0, 0xa0, 0x12, 0x34, 0xde, 0xad, 0xbe]);
		assert_eq!(request.body()[9], 0);
	}

	#[test]
	fn read_layouts() {
		let slave = SlaveAddress::DEFAULT;
		let request = Command::ReadNoStop { slave, width: AddressWidth::Eight, address: 0x7f }.encode();
		assert_eq!(&request.body()[..6], &[0x94, 1, 0, 0xa0, 0x7f, 0]);
		let request = Command::ReadRepeatedStart { slave, length: 60 }.encode();
		assert_eq!(&request.body()[..5], &[0x93, 60, 0, 0xa1, 0]);
		assert_eq!(Command::GetData.encode().body()[..2], [0x40, 0]);
	}

	#[test]
	fn decode_requires_echo_and_status() {
		let cmd = Command::Write {
			slave: SlaveAddress::DEFAULT,
			width: AddressWidth::Eight,
			address: 0,
			data: &[1],
		};
		assert_eq!(cmd.decode(&response(&[0x90, 0x00])), Ok(Reply::Done));
		assert_eq!(cmd.decode(&response(&[0x94, 0x00])), Err(DecodeError::Echo { expected: 0x90, actual: 0x94 }));
		assert_eq!(cmd.decode(&response(&[0x90, 0x01])), Err(DecodeError::Status(0x01)));
		assert_eq!(cmd.decode(&response(&[])), Err(DecodeError::Echo { expected: 0x90, actual: 0x00 }));
	}

	#[test]
	fn decode_set_speed_checks_divider() {
		let cmd = Command::SetSpeed { divider: 28 };
		assert_eq!(cmd.decode(&response(&[0x10, 0, 0, 0x20, 28])), Ok(Reply::Speed { divider: 28 }));
		assert_eq!(cmd.decode(&response(&[0x10, 0, 0, 0x20, 118])), Err(DecodeError::Divider { flag: 0x20, divider: 118 }));
		assert_eq!(cmd.decode(&response(&[0x10, 0, 0, 0x00, 28])), Err(DecodeError::Divider { flag: 0, divider: 28 }));
	}

	#[test]
	fn decode_cancel_in_flight() {
		assert_eq!(Command::Cancel.decode(&response(&[0x10, 0, 0x10])), Ok(Reply::Cancelled { in_flight: true }));
		assert_eq!(Command::Cancel.decode(&response(&[0x10, 0, 0x11])), Ok(Reply::Cancelled { in_flight: false }));
		assert!(response(&[0x10, 0x01, 0x10]).cancel_in_flight());
		assert!(response(&[0x00, 0x00, 0x10]).cancel_in_flight());
		assert!(!response(&[0x10, 0x00, 0x11]).cancel_in_flight());
	}

	#[test]
	fn decode_get_data() {
		assert_eq!(Command::GetData.decode(&response(&[0x40, 0, 0, 3, 9, 8, 7, 6])), Ok(Reply::Data(vec![9, 8, 7])));
		assert_eq!(Command::GetData.decode(&response(&[0x40, 0, 0, 0])), Ok(Reply::Data(vec![])));
		assert_eq!(Command::GetData.decode(&response(&[0x40, 0, 0, 127])), Err(DecodeError::NotReady));
		assert_eq!(Command::GetData.decode(&response(&[0x40, 0, 0, 61])), Err(DecodeError::Length(61)));
	}
}
