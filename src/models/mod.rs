pub mod filter;
pub mod reading;

pub use filter::{DateFilter, DateRange, FilterError};
pub use reading::{Field, NewReading, Reading, RecordError};
