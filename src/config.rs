use std::time::Duration;

use crate::eeprom::{
	AddressWidth,
	Capacity,
	EepromGeometry,
};
use crate::mcp2221::{
	self,
	I2cEngine,
	Session,
	SlaveAddress,
	Speed,
	Timing,
};
use crate::transport::{
	DeviceSelector,
	Transport,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BridgeId {
	pub vendor_id: u16,
	pub product_id: u16,
}

impl Default for BridgeId {
	fn default() -> Self {
		BridgeId {
			vendor_id: mcp2221::VENDOR_ID,
			product_id: mcp2221::PRODUCT_ID,
		}
	}
}

/// Everything a run needs to talk to the EEPROM; built once up front.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Config {
	pub bridge: BridgeId,
	pub device: DeviceSelector,
	pub speed: Speed,
	pub slave: SlaveAddress,
	pub geometry: EepromGeometry,
	pub timing: Timing,
	/// how long to block for a single response report
	pub read_timeout: Duration,
}

impl Config {
	pub fn new(capacity: Capacity, page_size: usize, address_width: AddressWidth) -> crate::AResult<Self> {
		Ok(Config {
			geometry: EepromGeometry::new(capacity, page_size, address_width)?,
			..Config::default()
		})
	}

	/// Configure the clock and check for the slave over `transport`.
	pub fn connect<T: Transport>(&self, transport: T) -> crate::AResult<Session<T>> {
		I2cEngine::new(transport, self.timing)
			.connect(self.speed, self.slave, self.geometry.address_width())
	}
}

impl Default for Config {
	fn default() -> Self {
		Config {
			bridge: BridgeId::default(),
			device: DeviceSelector::Name(mcp2221::DEFAULT_PRODUCT_NAME.to_string()),
			speed: Speed::default(),
			slave: SlaveAddress::default(),
			geometry: EepromGeometry::default(),
			timing: Timing::default(),
			read_timeout: Duration::from_secs(1),
		}
	}
}

fn parse_number(s: &str) -> crate::AResult<i64> {
	let parsed = if s.starts_with("0x") || s.starts_with("0X") {
		i64::from_str_radix(&s[2..], 16)
	} else {
		s.parse::<i64>()
	};
	parsed.map_err(|e| format_err!("{:?} is not a number: {}", s, e))
}

/// Start address: decimal or `0x` hex, never negative.
pub fn parse_offset(s: &str) -> crate::AResult<usize> {
	let value = parse_number(s)?;
	if value < 0 {
		bail!("offset must not be negative (got {})", value);
	}
	Ok(value as usize)
}

/// Byte count: decimal or `0x` hex; a negative count means "not given".
pub fn parse_count(s: &str) -> crate::AResult<Option<usize>> {
	let value = parse_number(s)?;
	if value < 0 {
		Ok(None)
	} else {
		Ok(Some(value as usize))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn offsets_accept_decimal_and_hex() {
		assert_eq!(parse_offset("0").unwrap(), 0);
		assert_eq!(parse_offset("10").unwrap(), 10);
		assert_eq!(parse_offset("0x10").unwrap(), 16);
		assert_eq!(parse_offset("0X1f").unwrap(), 31);
	}

	#[test]
	fn negative_offset_is_rejected() {
		let err = parse_offset("-5").unwrap_err();
		assert!(err.to_string().contains("negative"), "{}", err);
		assert!(parse_offset("-0x10").is_err());
	}

	#[test]
	fn garbage_is_rejected() {
		assert!(parse_offset("ten").is_err());
		assert!(parse_count("0x").is_err());
	}

	#[test]
	fn negative_count_means_unset() {
		assert_eq!(parse_count("-1").unwrap(), None);
		assert_eq!(parse_count("0x20").unwrap(), Some(32));
		assert_eq!(parse_count("0").unwrap(), Some(0));
	}
}
