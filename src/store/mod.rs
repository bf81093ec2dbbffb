//! Durable storage for readings.
//!
//! The [`ReadingStore`] trait is the seam between ingestion/query code and the
//! database; [`SqliteStore`] is the production implementation.

pub mod sqlite_store;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{DateFilter, NewReading, Reading};

pub use sqlite_store::SqliteStore;

/// Outcome of a committed append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendReceipt {
    pub stored: usize,
    pub first_id: i64,
    pub last_id: i64,
    pub recorded_at: DateTime<Utc>,
}

pub trait ReadingStore: Send + Sync {
    /// Persist a whole batch atomically. Every reading in the batch gets the
    /// same `recorded_at` and ids increasing in slice order.
    fn append(&self, batch: &[NewReading]) -> Result<AppendReceipt>;

    /// Readings recorded inside the filter's interval, ordered by id.
    fn query(&self, filter: &DateFilter) -> Result<Vec<Reading>>;

    fn count(&self) -> Result<u64>;
}
