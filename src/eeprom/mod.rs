mod geometry;
pub mod operations;
pub mod plan;

pub use self::geometry::{
	AddressWidth,
	Capacity,
	EepromGeometry,
	PAGE_SIZES,
};

pub use self::plan::{
	Segment,
	effective_length,
	read_plan,
	write_plan,
};
