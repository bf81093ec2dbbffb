use thiserror::Error;

use crate::models::{FilterError, RecordError};

pub type Result<T> = std::result::Result<T, DronitorError>;

#[derive(Error, Debug)]
pub enum DronitorError {
    #[error("Line {line}: {source}")]
    Validation {
        line: usize,
        #[source]
        source: RecordError,
    },

    #[error("Line {line}: blank line rejected by strict line policy")]
    BlankLine { line: usize },

    #[error("Upload is not valid UTF-8 text")]
    InvalidEncoding,

    #[error("Upload contains no readings")]
    EmptyBatch,

    #[error("Invalid date filter: {0}")]
    QueryFilter(#[from] FilterError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Reading validation error: {0}")]
    Record(#[from] validator::ValidationErrors),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    EmptyBatch,
    QueryFilter,
    Storage,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_failure",
            ErrorKind::EmptyBatch => "empty_batch",
            ErrorKind::QueryFilter => "query_filter_failure",
            ErrorKind::Storage => "storage_failure",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl DronitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DronitorError::Validation { .. }
            | DronitorError::BlankLine { .. }
            | DronitorError::InvalidEncoding
            | DronitorError::Record(_) => ErrorKind::Validation,
            DronitorError::EmptyBatch => ErrorKind::EmptyBatch,
            DronitorError::QueryFilter(_) => ErrorKind::QueryFilter,
            DronitorError::Storage(_) | DronitorError::StoreUnavailable(_) => ErrorKind::Storage,
            DronitorError::Io(_)
            | DronitorError::Csv(_)
            | DronitorError::Json(_)
            | DronitorError::Config(_)
            | DronitorError::Server(_)
            | DronitorError::TaskJoin(_) => ErrorKind::Internal,
        }
    }

    /// 1-based line number of the offending upload line, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            DronitorError::Validation { line, .. } | DronitorError::BlankLine { line } => {
                Some(*line)
            }
            _ => None,
        }
    }

    /// Name of the offending field for field-level validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DronitorError::Validation { source, .. } => source.field().map(|f| f.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[test]
    fn test_validation_error_exposes_line_and_field() {
        let err = DronitorError::Validation {
            line: 3,
            source: RecordError::OutOfRange {
                field: Field::Latitude,
                value: "91".to_string(),
            },
        };

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.field(), Some("latitude"));
        assert!(err.to_string().starts_with("Line 3: latitude"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(DronitorError::EmptyBatch.kind(), ErrorKind::EmptyBatch);
        assert_eq!(
            DronitorError::QueryFilter(FilterError::MonthWithoutYear).kind(),
            ErrorKind::QueryFilter
        );
        assert_eq!(
            DronitorError::StoreUnavailable("poisoned".to_string()).kind(),
            ErrorKind::Storage
        );
        assert_eq!(DronitorError::BlankLine { line: 2 }.field(), None);
    }
}
