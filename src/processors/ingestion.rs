use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::Result;
use crate::readers::{BatchParser, ParsedBatch};
use crate::store::ReadingStore;

/// What a successful upload produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub stored: usize,
    pub lines_processed: usize,
    pub blank_lines_skipped: usize,
    pub first_id: i64,
    pub last_id: i64,
    pub recorded_at: DateTime<Utc>,
}

impl IngestSummary {
    pub fn message(&self) -> String {
        format!("Successfully uploaded {} readings", self.stored)
    }
}

/// Runs one upload through parse and persist as a single unit.
///
/// Nothing reaches the store unless every line of the upload parsed, and the
/// store commits the batch in one transaction.
pub struct IngestionService<S> {
    store: Arc<S>,
    parser: BatchParser,
}

impl<S> Clone for IngestionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            parser: self.parser,
        }
    }
}

impl<S: ReadingStore> IngestionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            parser: BatchParser::new(),
        }
    }

    pub fn with_parser(mut self, parser: BatchParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ingest_bytes(&self, bytes: &[u8]) -> Result<IngestSummary> {
        let parsed = self.parser.parse_bytes(bytes);
        self.commit(parsed, &format!("upload of {} bytes", bytes.len()))
    }

    pub fn ingest_str(&self, content: &str) -> Result<IngestSummary> {
        let parsed = self.parser.parse_str(content);
        self.commit(parsed, &format!("upload of {} bytes", content.len()))
    }

    pub fn ingest_file(&self, path: &Path) -> Result<IngestSummary> {
        info!("Ingesting {}", path.display());
        let parsed = self.parser.parse_file(path);
        self.commit(parsed, &path.display().to_string())
    }

    fn commit(&self, parsed: Result<ParsedBatch>, origin: &str) -> Result<IngestSummary> {
        let started = Instant::now();

        let batch = parsed.inspect_err(|e| {
            warn!("Rejected {}: {}", origin, e);
        })?;

        let receipt = self.store.append(&batch.readings).inspect_err(|e| {
            warn!("Failed to store {} parsed readings: {}", batch.len(), e);
        })?;

        let summary = IngestSummary {
            stored: receipt.stored,
            lines_processed: batch.lines_processed,
            blank_lines_skipped: batch.blank_lines_skipped,
            first_id: receipt.first_id,
            last_id: receipt.last_id,
            recorded_at: receipt.recorded_at,
        };

        info!(
            "Stored {} readings (ids {}..={}) in {:?}",
            summary.stored,
            summary.first_id,
            summary.last_id,
            started.elapsed()
        );
        Ok(summary)
    }
}
