//! Splitting byte ranges into bus transactions.
//!
//! Page writes wrap around inside the page on the chip, so a write segment
//! must never cross a page boundary. Reads can cross pages freely and are
//! only limited by the bridge's transfer buffer.

use crate::error::EepromError;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Segment {
	pub address: usize,
	pub length: usize,
}

impl Segment {
	pub fn end(&self) -> usize {
		self.address + self.length
	}
}

/// Resolve the number of bytes to transfer and check it fits into the
/// device. `None` means "everything from `offset` to the end".
pub fn effective_length(capacity: usize, offset: usize, requested: Option<usize>) -> Result<usize, EepromError> {
	let length = match requested {
		Some(length) => length,
		None => capacity.saturating_sub(offset),
	};
	let fits = offset.checked_add(length).map_or(false, |end| end <= capacity);
	if !fits {
		return Err(EepromError::Range {
			offset,
			length,
			capacity,
		});
	}
	Ok(length)
}

/// Page-aligned segments for writing `length` bytes at `offset`.
pub fn write_plan(offset: usize, length: usize, page_size: usize) -> WritePlan {
	assert!(page_size > 0);
	WritePlan {
		address: offset,
		end: offset + length,
		page_size,
	}
}

/// Segments of at most `max_read_size` bytes for reading `length` bytes at
/// `offset`.
pub fn read_plan(offset: usize, length: usize, max_read_size: usize) -> ReadPlan {
	assert!(max_read_size > 0);
	ReadPlan {
		address: offset,
		end: offset + length,
		max_read_size,
	}
}

pub struct WritePlan {
	address: usize,
	end: usize,
	page_size: usize,
}

impl Iterator for WritePlan {
	type Item = Segment;

	fn next(&mut self) -> Option<Segment> {
		if self.address >= self.end {
			return None;
		}
		// fill up to the next page boundary
		let to_boundary = self.page_size - (self.address % self.page_size);
		let length = to_boundary.min(self.end - self.address);
		let segment = Segment { address: self.address, length };
		self.address += length;
		Some(segment)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		if self.address >= self.end {
			return (0, Some(0));
		}
		let first_page = self.address / self.page_size;
		let last_page = (self.end - 1) / self.page_size;
		let n = last_page - first_page + 1;
		(n, Some(n))
	}
}

impl ExactSizeIterator for WritePlan {}

pub struct ReadPlan {
	address: usize,
	end: usize,
	max_read_size: usize,
}

impl Iterator for ReadPlan {
	type Item = Segment;

	fn next(&mut self) -> Option<Segment> {
		if self.address >= self.end {
			return None;
		}
		let length = self.max_read_size.min(self.end - self.address);
		let segment = Segment { address: self.address, length };
		self.address += length;
		Some(segment)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let remaining = self.end.saturating_sub(self.address);
		let n = (remaining + self.max_read_size - 1) / self.max_read_size;
		(n, Some(n))
	}
}

impl ExactSizeIterator for ReadPlan {}
