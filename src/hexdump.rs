use std::io::{
	self,
	Write,
};

const RULE: &str = "----------------------------------------------------";
const COLUMNS: usize = 16;

/// Console dump: 16 bytes per row, each row prefixed with the address of
/// its first byte.
pub struct HexDump<W: Write> {
	out: W,
	address: usize,
	column: usize,
}

impl<W: Write> HexDump<W> {
	pub fn new(mut out: W, start: usize) -> io::Result<Self> {
		writeln!(out, "{}", RULE)?;
		write!(out, "    |")?;
		for n in 0..COLUMNS {
			write!(out, "{:02x} ", n)?;
		}
		writeln!(out)?;
		writeln!(out, "{}", RULE)?;

		Ok(HexDump {
			out,
			address: start,
			column: 0,
		})
	}

	pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
		for b in data {
			if self.column == 0 {
				write!(self.out, "{:04x}|", self.address)?;
			}
			write!(self.out, "{:02x} ", b)?;
			self.address += 1;
			self.column += 1;
			if self.column == COLUMNS {
				writeln!(self.out)?;
				self.column = 0;
			}
		}
		self.out.flush()
	}

	/// Terminate a partial row.
	pub fn finish(mut self) -> io::Result<W> {
		if self.column != 0 {
			writeln!(self.out)?;
		}
		self.out.flush()?;
		Ok(self.out)
	}
}
