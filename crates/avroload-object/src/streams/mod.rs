//! Async reader and writer adapters over stored objects.

mod read_object;
mod write_object;

pub use read_object::ObjectReader;
pub use write_object::{DEFAULT_PART_SIZE, ObjectWriter};
