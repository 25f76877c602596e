#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod config;
pub mod eeprom;
pub mod error;
pub mod hexdump;
pub mod mcp2221;
pub mod transport;

pub use self::error::EepromError;

/// Kind of a failed operation, if it was one of ours.
pub fn error_kind(e: &failure::Error) -> Option<&EepromError> {
	e.downcast_ref::<EepromError>()
}
