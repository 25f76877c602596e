//! Whole-range transfers on top of a connected session.
//!
//! A failing segment stops the transfer; segments already done stay done.

use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::path::Path;

use super::plan::{
	Segment,
	effective_length,
	read_plan,
	write_plan,
};
use super::EepromGeometry;
use crate::error::EepromError;
use crate::hexdump::HexDump;
use crate::mcp2221::{
	MAX_READ_SIZE,
	Session,
};
use crate::transport::Transport;

/// Read up to `limit` bytes from the start of `path`.
pub fn load_source(path: &Path, limit: Option<usize>) -> crate::AResult<Vec<u8>> {
	let file = match fs::File::open(path) {
		Ok(f) => f,
		Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
			return Err(EepromError::File {
				path: path.display().to_string(),
				reason: "is not found",
			}.into());
		},
		Err(e) => return Err(e.into()),
	};

	let mut data = Vec::new();
	let limit = limit.map_or(u64::max_value(), |l| l as u64);
	with_context!(("cannot read '{}'", path.display()), {
		file.take(limit).read_to_end(&mut data)?;
		Ok(())
	})?;
	info!("'{}' size is {} bytes", path.display(), data.len());
	Ok(data)
}

/// Create `path` for a dump; an existing file is never touched.
pub fn create_destination(path: &Path) -> crate::AResult<fs::File> {
	match fs::OpenOptions::new().write(true).create_new(true).open(path) {
		Ok(f) => Ok(f),
		Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => Err(EepromError::File {
			path: path.display().to_string(),
			reason: "already exists",
		}.into()),
		Err(e) => Err(e.into()),
	}
}

/// Write `data` at `offset`, one page-aligned segment per transaction.
pub fn write_range<T, F>(session: &mut Session<T>, geometry: &EepromGeometry, offset: usize, data: &[u8], mut on_segment: F) -> crate::AResult<()>
where
	T: Transport,
	F: FnMut(Segment),
{
	effective_length(geometry.total_size(), offset, Some(data.len()))?;
	let plan = write_plan(offset, data.len(), geometry.page_size());
	debug!("writing {} bytes at 0x{:x} in {} segments", data.len(), offset, plan.len());

	for segment in plan {
		let start = segment.address - offset;
		session.write_segment(segment.address, &data[start..start + segment.length])?;
		on_segment(segment);
	}
	Ok(())
}

/// Read `length` bytes at `offset`, handing each segment to `on_segment`.
pub fn read_range<T, F>(session: &mut Session<T>, geometry: &EepromGeometry, offset: usize, length: usize, mut on_segment: F) -> crate::AResult<()>
where
	T: Transport,
	F: FnMut(Segment, &[u8]) -> crate::AResult<()>,
{
	effective_length(geometry.total_size(), offset, Some(length))?;
	let plan = read_plan(offset, length, MAX_READ_SIZE);
	debug!("reading {} bytes at 0x{:x} in {} segments", length, offset, plan.len());

	for segment in plan {
		let data = session.read_segment(segment.address, segment.length)?;
		on_segment(segment, &data)?;
	}
	Ok(())
}

fn progress_marker<P: Write>(progress: &mut P) -> io::Result<()> {
	write!(progress, ".")?;
	progress.flush()
}

/// Write with a `.` on `progress` per segment.
pub fn write_with_progress<T, P>(session: &mut Session<T>, geometry: &EepromGeometry, offset: usize, data: &[u8], mut progress: P) -> crate::AResult<()>
where
	T: Transport,
	P: Write,
{
	let result = write_range(session, geometry, offset, data, |_| {
		if let Err(e) = progress_marker(&mut progress) {
			warn!("cannot print progress: {}", e);
		}
	});
	writeln!(progress)?;
	result
}

/// Copy a range into `out` with a `.` on `progress` per segment.
pub fn read_to_writer<T, W, P>(session: &mut Session<T>, geometry: &EepromGeometry, offset: usize, length: usize, mut out: W, mut progress: P) -> crate::AResult<()>
where
	T: Transport,
	W: Write,
	P: Write,
{
	let result = read_range(session, geometry, offset, length, |_, data| {
		out.write_all(data)?;
		progress_marker(&mut progress)?;
		Ok(())
	});
	writeln!(progress)?;
	result?;
	out.flush()?;
	Ok(())
}

/// Print a range as a hex dump.
pub fn read_to_dump<T, W>(session: &mut Session<T>, geometry: &EepromGeometry, offset: usize, length: usize, out: W) -> crate::AResult<()>
where
	T: Transport,
	W: Write,
{
	let mut dump = HexDump::new(out, offset)?;
	let result = read_range(session, geometry, offset, length, |_, data| {
		dump.write(data)?;
		Ok(())
	});
	dump.finish()?;
	result
}
