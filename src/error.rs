use crate::mcp2221::report::DecodeError;

/// Reasons an EEPROM operation stops.
///
/// Everything else (HID failures, bad arguments) travels as a plain
/// `failure::Error`.
#[derive(Debug, Fail)]
pub enum EepromError {
	/// The bridge didn't accept the clock divider; nothing else can work.
	#[fail(display = "cannot set i2c clock divider {}: {}", divider, cause)]
	Configuration {
		divider: u8,
		#[fail(cause)]
		cause: DecodeError,
	},

	#[fail(display = "not found slave 0x{:02x}", slave)]
	DeviceNotFound {
		slave: u8,
	},

	/// Raised before any report is sent.
	#[fail(display = "rom size ({} bytes) is too small for {} bytes at offset 0x{:x}", capacity, length, offset)]
	Range {
		offset: usize,
		length: usize,
		capacity: usize,
	},

	/// A segment transaction was NACKed; the bridge has been cancelled.
	#[fail(display = "{} at 0x{:04x} failed: {}", command, address, cause)]
	Transfer {
		command: &'static str,
		address: usize,
		#[fail(cause)]
		cause: DecodeError,
	},

	#[fail(display = "'{}' {}", path, reason)]
	File {
		path: String,
		reason: &'static str,
	},
}

impl EepromError {
	pub fn is_range(&self) -> bool {
		match self {
			EepromError::Range { .. } => true,
			_ => false,
		}
	}

	pub fn is_transfer(&self) -> bool {
		match self {
			EepromError::Transfer { .. } => true,
			_ => false,
		}
	}
}
