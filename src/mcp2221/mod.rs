/// Microchip MCP2221(A): USB 2.0 to I2C/UART protocol converter
///
/// The I2C side is driven through 64-byte HID reports. Every command report
/// is answered with a report echoing the command code in byte 0 and a status
/// in byte 1 (zero meaning "completed"). Reads are two-step: a read command
/// makes the chip clock data off the bus into an internal buffer, and a
/// separate "get I2C data" command fetches that buffer.
///
/// The chip does not queue commands; the next report may only go out once
/// the previous response was read.

use std::fmt;
use std::str;

pub mod engine;
pub mod report;
#[cfg(any(test, feature = "simulator"))]
pub mod simulator;

pub use self::engine::{
	DeviceSession,
	I2cEngine,
	Session,
	Timing,
};

pub const VENDOR_ID: u16 = 0x04d8;
pub const PRODUCT_ID: u16 = 0x00dd;
pub const DEFAULT_PRODUCT_NAME: &str = "MCP2221 USB-I2C/UART Combo";

/// Largest payload a single I2C read transaction may return
pub const MAX_READ_SIZE: usize = 60;
/// Largest payload a single I2C write transaction is built for
pub const MAX_WRITE_SIZE: usize = 32;

/// the bridge's I2C clock is derived from a 12 MHz base
const CLOCK_BASE_KHZ: u32 = 12_000;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Speed {
	Standard,
	Fast,
}

impl Speed {
	pub fn kbps(self) -> u32 {
		match self {
			Speed::Standard => 100,
			Speed::Fast => 400,
		}
	}

	pub fn divider(self) -> u8 {
		(CLOCK_BASE_KHZ / self.kbps() - 2) as u8
	}
}

impl Default for Speed {
	fn default() -> Self {
		Speed::Fast
	}
}

impl fmt::Display for Speed {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}k", self.kbps())
	}
}

impl str::FromStr for Speed {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"100k" => Ok(Speed::Standard),
			"400k" => Ok(Speed::Fast),
			_ => bail!("unsupported i2c speed {:?} (expected 100k or 400k)", s),
		}
	}
}

/// 7-bit I2C slave address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SlaveAddress(u8);

impl SlaveAddress {
	pub const DEFAULT: SlaveAddress = SlaveAddress(0x50);

	pub fn new(address: u8) -> crate::AResult<Self> {
		ensure!(address <= 0x7f, "i2c slave address 0x{:02x} doesn't fit in 7 bits", address);
		Ok(SlaveAddress(address))
	}

	pub fn get(self) -> u8 {
		self.0
	}

	/// address byte with R/W bit clear
	pub fn write_byte(self) -> u8 {
		self.0 << 1
	}

	/// address byte with R/W bit set
	pub fn read_byte(self) -> u8 {
		(self.0 << 1) | 0x01
	}
}

impl Default for SlaveAddress {
	fn default() -> Self {
		SlaveAddress::DEFAULT
	}
}

impl fmt::Display for SlaveAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl str::FromStr for SlaveAddress {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = with_context!(("invalid i2c slave address {:?}", s), {
			if s.starts_with("0x") || s.starts_with("0X") {
				Ok(u8::from_str_radix(&s[2..], 16)?)
			} else {
				Ok(s.parse::<u8>()?)
			}
		})?;
		SlaveAddress::new(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn divider_from_speed() {
		assert_eq!(Speed::Standard.divider(), 118);
		assert_eq!(Speed::Fast.divider(), 28);
	}

	#[test]
	fn speed_round_trips_through_text() {
		assert_eq!("100k".parse::<Speed>().unwrap(), Speed::Standard);
		assert_eq!(Speed::Fast.to_string(), "400k");
		assert!("1M".parse::<Speed>().is_err());
	}

	#[test]
	fn slave_address_parsing() {
		assert_eq!("0x50".parse::<SlaveAddress>().unwrap().get(), 0x50);
		assert_eq!("80".parse::<SlaveAddress>().unwrap().get(), 0x50);
		assert!("0x80".parse::<SlaveAddress>().is_err());
		assert!("zz".parse::<SlaveAddress>().is_err());
	}

	#[test]
	fn slave_direction_bits() {
		let slave = SlaveAddress::DEFAULT;
		assert_eq!(slave.write_byte(), 0xa0);
		assert_eq!(slave.read_byte(), 0xa1);
	}
}
