//! HTTP surface: upload and query routes behind a shared-secret header.

pub mod handlers;
pub mod response;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Settings;
use crate::error::Result;
use crate::processors::IngestionService;
use crate::store::ReadingStore;

pub use response::ApiError;

pub type ApiKeys = Arc<HashSet<String>>;

pub struct AppState<S> {
    pub service: IngestionService<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<S: ReadingStore> AppState<S> {
    pub fn new(service: IngestionService<S>) -> Self {
        Self { service }
    }
}

/// Build the application router. `/health` is open; every other route
/// requires one of `api_keys` in the `X-API-Key` header.
pub fn router<S: ReadingStore + 'static>(
    state: AppState<S>,
    api_keys: ApiKeys,
    max_upload_bytes: usize,
) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload::<S>))
        .route("/readings", get(handlers::readings::<S>))
        .route_layer(middleware::from_fn_with_state(
            api_keys,
            handlers::require_api_key,
        ))
        .route("/health", get(handlers::health::<S>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<S: ReadingStore + 'static>(state: AppState<S>, settings: &Settings) -> Result<()> {
    settings.validate_for_serving()?;

    let api_keys: ApiKeys = Arc::new(settings.api_keys.iter().cloned().collect());
    let app = router(state, api_keys, settings.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(settings.bind_address()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received CTRL+C, shutting down gracefully");
}
