use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{DronitorError, ErrorKind};

/// JSON error body returned by every route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

#[derive(Debug)]
pub enum ApiError {
    Forbidden,
    MissingFile,
    Multipart(MultipartError),
    MultipartRejected(MultipartRejection),
    QueryRejected(QueryRejection),
    Dronitor(DronitorError),
}

impl From<DronitorError> for ApiError {
    fn from(err: DronitorError) -> Self {
        ApiError::Dronitor(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Dronitor(err.into())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::MultipartRejected(rejection)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::QueryRejected(rejection)
    }
}

fn rejection_body(kind: ErrorKind, message: String) -> ErrorBody {
    warn!("Request rejected: {}", message);
    ErrorBody {
        error: kind.as_str(),
        message,
        line: None,
        field: None,
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::EmptyBatch | ErrorKind::QueryFilter => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: "forbidden",
                    message: "Invalid API key".to_string(),
                    line: None,
                    field: None,
                },
            ),
            ApiError::MissingFile => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation_failure",
                    message: "multipart field 'file' is required".to_string(),
                    line: None,
                    field: None,
                },
            ),
            ApiError::Multipart(err) => (
                err.status(),
                rejection_body(ErrorKind::Validation, err.body_text()),
            ),
            ApiError::MultipartRejected(rejection) => (
                rejection.status(),
                rejection_body(ErrorKind::Validation, rejection.body_text()),
            ),
            ApiError::QueryRejected(rejection) => (
                StatusCode::BAD_REQUEST,
                rejection_body(ErrorKind::QueryFilter, rejection.body_text()),
            ),
            ApiError::Dronitor(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    error!("Request failed: {}", err);
                } else {
                    warn!("Request rejected: {}", err);
                }
                (
                    status,
                    ErrorBody {
                        error: kind.as_str(),
                        message: err.to_string(),
                        line: err.line(),
                        field: err.field(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
