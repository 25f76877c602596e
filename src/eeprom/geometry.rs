use std::fmt;
use std::str;

/// Width of the word address sent after the slave address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum AddressWidth {
	Eight,
	Sixteen,
}

impl AddressWidth {
	pub fn from_bits(bits: u32) -> crate::AResult<Self> {
		match bits {
			8 => Ok(AddressWidth::Eight),
			16 => Ok(AddressWidth::Sixteen),
			_ => bail!("unsupported address width {} (expected 8 or 16)", bits),
		}
	}

	pub fn bits(self) -> u32 {
		match self {
			AddressWidth::Eight => 8,
			AddressWidth::Sixteen => 16,
		}
	}

	/// number of address bytes on the wire
	pub fn bytes(self) -> usize {
		match self {
			AddressWidth::Eight => 1,
			AddressWidth::Sixteen => 2,
		}
	}

	/// address bytes, high byte first
	pub fn encode(self, address: usize) -> ([u8; 2], usize) {
		match self {
			AddressWidth::Eight => ([address as u8, 0], 1),
			AddressWidth::Sixteen => ([(address >> 8) as u8, address as u8], 2),
		}
	}
}

impl Default for AddressWidth {
	fn default() -> Self {
		AddressWidth::Eight
	}
}

impl str::FromStr for AddressWidth {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bits = with_context!(("invalid address width {:?}", s), {
			Ok(s.parse::<u32>()?)
		})?;
		AddressWidth::from_bits(bits)
	}
}

/// Capacity selector in kbit, as printed on 24Cxx parts
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Capacity(u32);

impl Capacity {
	pub const SELECTORS: [u32; 10] = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512];

	pub fn from_kbit(kbit: u32) -> crate::AResult<Self> {
		ensure!(Capacity::SELECTORS.contains(&kbit), "unsupported rom size {}k", kbit);
		Ok(Capacity(kbit))
	}

	pub fn kbit(self) -> u32 {
		self.0
	}

	pub fn bytes(self) -> usize {
		128 * self.0 as usize
	}
}

impl Default for Capacity {
	fn default() -> Self {
		Capacity(2)
	}
}

impl fmt::Display for Capacity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}k", self.0)
	}
}

impl str::FromStr for Capacity {
	type Err = ::failure::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ensure!(s.ends_with('k') || s.ends_with('K'), "rom size {:?} must be given in kbit (like 2k)", s);
		let kbit = with_context!(("invalid rom size {:?}", s), {
			Ok(s[..s.len() - 1].parse::<u32>()?)
		})?;
		Capacity::from_kbit(kbit)
	}
}

pub const PAGE_SIZES: [usize; 4] = [4, 8, 16, 32];

/// Shape of the EEPROM, fixed for a whole run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EepromGeometry {
	total_size: usize,
	page_size: usize,
	address_width: AddressWidth,
}

impl EepromGeometry {
	/// Chips above 256 bytes can't be addressed with a single address byte,
	/// so the requested width is widened to 16 bits for them.
	pub fn new(capacity: Capacity, page_size: usize, address_width: AddressWidth) -> crate::AResult<Self> {
		ensure!(PAGE_SIZES.contains(&page_size), "unsupported page size {} (expected one of {:?})", page_size, PAGE_SIZES);

		let total_size = capacity.bytes();
		let address_width = if total_size > 256 && address_width == AddressWidth::Eight {
			debug!("{} bytes rom needs 16-bit addresses", total_size);
			AddressWidth::Sixteen
		} else {
			address_width
		};

		Ok(EepromGeometry {
			total_size,
			page_size,
			address_width,
		})
	}

	pub fn total_size(&self) -> usize {
		self.total_size
	}

	pub fn page_size(&self) -> usize {
		self.page_size
	}

	pub fn address_width(&self) -> AddressWidth {
		self.address_width
	}
}

impl Default for EepromGeometry {
	// 24C02: 2 kbit, 8 byte pages
	fn default() -> Self {
		EepromGeometry {
			total_size: Capacity::default().bytes(),
			page_size: 8,
			address_width: AddressWidth::Eight,
		}
	}
}

impl fmt::Display for EepromGeometry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} bytes, {} byte pages, {}-bit addresses", self.total_size, self.page_size, self.address_width.bits())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn capacity_selectors() {
		assert_eq!("1k".parse::<Capacity>().unwrap().bytes(), 128);
		assert_eq!("2k".parse::<Capacity>().unwrap().bytes(), 256);
		assert_eq!("512k".parse::<Capacity>().unwrap().bytes(), 65536);
		assert!("3k".parse::<Capacity>().is_err());
		assert!("2".parse::<Capacity>().is_err());
		assert!("xk".parse::<Capacity>().is_err());
	}

	#[test]
	fn address_width_follows_capacity() {
		for &kbit in Capacity::SELECTORS.iter() {
			let capacity = Capacity::from_kbit(kbit).unwrap();
			for &requested in [AddressWidth::Eight, AddressWidth::Sixteen].iter() {
				let geometry = EepromGeometry::new(capacity, 8, requested).unwrap();
				if geometry.total_size() > 256 {
					assert_eq!(geometry.address_width(), AddressWidth::Sixteen);
				} else {
					assert_eq!(geometry.address_width(), requested);
				}
			}
		}
	}

	#[test]
	fn rejects_odd_page_sizes() {
		assert!(EepromGeometry::new(Capacity::default(), 12, AddressWidth::Eight).is_err());
		assert!(EepromGeometry::new(Capacity::default(), 64, AddressWidth::Eight).is_err());
	}

	#[test]
	fn address_bytes_are_big_endian() {
		assert_eq!(AddressWidth::Sixteen.encode(0x1234), ([0x12, 0x34], 2));
		assert_eq!(AddressWidth::Eight.encode(0x34), ([0x34, 0], 1));
	}
}
