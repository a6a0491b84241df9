//! HTTP service exposing the triage pipeline
//!
//! Routes:
//! - `POST /api/analyze`: multipart upload, JSON risk report
//! - `POST /api/download_csv`: multipart upload, augmented CSV
//! - `GET /api/health`: liveness and loaded model

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ServerConfig;
use crate::engine::TriageEngine;

/// Shared, read-only application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TriageEngine>,
    /// Model location reported by the health endpoint
    pub model_path: String,
}

impl AppState {
    pub fn new(engine: TriageEngine) -> Self {
        let model_path = engine
            .bundle()
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        AppState {
            engine: Arc::new(engine),
            model_path,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/download_csv", post(handlers::download_csv))
        .route("/api/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .with_state(state)
}
