//! Error types for qrserve operations

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Result type alias using qrserve's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qrserve operations
#[derive(Error, Debug)]
pub enum Error {
    /// Request input was rejected before any work was attempted
    #[error("{0}")]
    Validation(String),

    /// QR symbol could not be built for the payload
    #[error("Failed to encode QR code: {0}")]
    QrEncode(String),

    /// Rendering or writing the PNG failed
    #[error("Image processing error: {0}")]
    Image(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored artifact does not exist or cannot be read
    #[error("File not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Coarse failure classification for callers that branch on the cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, e.g. empty data
    Validation,
    /// QR encoding or PNG rendering failed
    Encoding,
    /// Filesystem failure
    Io,
    /// Requested artifact is missing
    NotFound,
    /// Invalid configuration
    Config,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable lowercase label used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Encoding => "encoding",
            Self::Io => "io",
            Self::NotFound => "not_found",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::QrEncode(_) | Error::Image(_) => ErrorKind::Encoding,
            Error::Io(_) => ErrorKind::Io,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Config(_) => ErrorKind::Config,
            Error::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(io) => Error::Io(io),
            other => Error::Image(other.to_string()),
        }
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(e: qrcode::types::QrError) -> Self {
        Error::QrEncode(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(format!("JSON error: {}", e))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::Validation("No data provided".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::QrEncode("too long".into()).kind(), ErrorKind::Encoding);
        assert_eq!(Error::Image("bad png".into()).kind(), ErrorKind::Encoding);
        assert_eq!(
            Error::from(std::io::Error::other("disk full")).kind(),
            ErrorKind::Io
        );
        assert_eq!(Error::NotFound("x.png".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = Error::Validation("No data provided".into());
        assert_eq!(err.to_string(), "No data provided");
    }

    #[test]
    fn test_qr_error_maps_to_encoding() {
        let err = Error::from(qrcode::types::QrError::DataTooLong);
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn test_not_found_response_status() {
        let response = Error::NotFound("missing.png".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
