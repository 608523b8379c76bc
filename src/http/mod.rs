//! HTTP surface: index page, generation, download, preview and metrics routes

mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::MetricsFormat;
use crate::metrics::GenerationMetrics;
use crate::service::QrService;

pub use handlers::GenerateResponse;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The QR service writing into the storage directory.
    pub service: Arc<QrService>,
    /// Generation metrics aggregator.
    pub metrics: Arc<GenerationMetrics>,
    /// Format used by the `/metrics` route.
    pub metrics_format: MetricsFormat,
}

impl AppState {
    /// Wrap a service with fresh metrics.
    pub fn new(service: QrService, metrics_format: MetricsFormat) -> Self {
        Self {
            service: Arc::new(service),
            metrics: Arc::new(GenerationMetrics::new()),
            metrics_format,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let previews = ServeDir::new(state.service.storage_dir());

    Router::new()
        .route("/", get(handlers::index))
        .route("/generate_qr", post(handlers::generate_qr))
        .route("/download/{filename}", get(handlers::download))
        .route("/metrics", get(handlers::metrics))
        .nest_service("/static/qr_codes", previews)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
