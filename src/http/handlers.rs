use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::error::{Error, Result};
use crate::qr::QrType;
use crate::service::{GenerationRequest, QrArtifact};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Body of every `/generate_qr` response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Whether an image was produced
    pub success: bool,
    /// Stored file name on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Encoded payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Type tag as requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_type: Option<String>,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateResponse {
    fn success(artifact: QrArtifact) -> Self {
        Self {
            success: true,
            filename: Some(artifact.filename),
            url: Some(artifact.payload),
            qr_type: Some(artifact.qr_type),
            error: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            filename: None,
            url: None,
            qr_type: None,
            error: Some(message.into()),
        }
    }
}

pub(super) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Failures are reported in the body with a 200 status.
pub(super) async fn generate_qr(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerationRequest>, JsonRejection>,
) -> Json<GenerateResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected generate request body");
            return Json(GenerateResponse::failure(rejection.body_text()));
        }
    };

    let started = Instant::now();
    let qr_type = QrType::parse(request.type_tag());
    let service = Arc::clone(&state.service);

    let outcome = tokio::task::spawn_blocking(move || service.generate(&request))
        .await
        .unwrap_or_else(|e| Err(Error::Other(format!("QR generation task failed: {e}"))));

    state
        .metrics
        .record(started.elapsed(), outcome.is_ok(), qr_type.as_str());

    match outcome {
        Ok(artifact) => Json(GenerateResponse::success(artifact)),
        Err(err) => Json(GenerateResponse::failure(err.to_string())),
    }
}

pub(super) async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let service = Arc::clone(&state.service);
    let name = filename.clone();
    let stored = tokio::task::spawn_blocking(move || service.open_artifact(&name))
        .await
        .map_err(|e| Error::NotFound(format!("{filename}: {e}")))??;

    let disposition = format!("attachment; filename=\"{}\"", stored.filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, stored.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(stored.bytes),
    )
        .into_response())
}

pub(super) async fn metrics(State(state): State<AppState>) -> Response {
    let (content_type, body) = state.metrics.render(state.metrics_format);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}
