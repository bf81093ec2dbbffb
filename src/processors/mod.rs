pub mod ingestion;

pub use ingestion::{IngestSummary, IngestionService};
