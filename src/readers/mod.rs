pub mod batch_reader;

pub use batch_reader::{BatchParser, LinePolicy, ParsedBatch};
