use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::DronitorError;
use crate::models::{DateFilter, Reading};
use crate::processors::IngestSummary;
use crate::server::{ApiError, ApiKeys, AppState};
use crate::store::ReadingStore;
use crate::utils::constants::{API_KEY_HEADER, UPLOAD_FIELD_NAME};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: IngestSummary,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReadingsParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub readings: u64,
}

pub async fn require_api_key(
    State(api_keys): State<ApiKeys>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| api_keys.contains(key));

    if authorized {
        next.run(request).await
    } else {
        warn!("Rejected {} {}: invalid API key", request.method(), request.uri().path());
        ApiError::Forbidden.into_response()
    }
}

pub async fn upload<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut content = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD_NAME) {
            debug!("Receiving upload {:?}", field.file_name());
            content = Some(field.bytes().await?);
            break;
        }
    }
    let content = content.ok_or(ApiError::MissingFile)?;

    let service = state.service.clone();
    let summary = tokio::task::spawn_blocking(move || service.ingest_bytes(&content)).await??;

    Ok(Json(UploadResponse {
        message: summary.message(),
        summary,
    }))
}

pub async fn readings<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
    params: Result<Query<ReadingsParams>, QueryRejection>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let Query(params) = params?;
    // Reject bad filter combinations before touching the store
    let filter = DateFilter::from_parts(params.year, params.month, params.day)
        .map_err(DronitorError::from)?;

    let store = Arc::clone(state.service.store());
    let readings = tokio::task::spawn_blocking(move || store.query(&filter)).await??;

    Ok(Json(readings))
}

pub async fn health<S: ReadingStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let store = Arc::clone(state.service.store());
    let readings = tokio::task::spawn_blocking(move || store.count()).await??;

    Ok(Json(HealthResponse {
        status: "ok",
        readings,
    }))
}
