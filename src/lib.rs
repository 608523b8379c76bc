//! qrserve - turn URLs, phone numbers, emails and coordinates into QR codes
//!
//! A small HTTP service: clients post `{data, type}`, the service formats the
//! payload for the requested type, renders it as a PNG into a storage
//! directory and hands back the filename for download.
//!
//! # Example
//!
//! ```no_run
//! use qrserve::{GenerationRequest, QrService, SymbolConfig};
//!
//! fn main() -> qrserve::Result<()> {
//!     let service = QrService::new("static/qr_codes", SymbolConfig::default())?;
//!
//!     let request = GenerationRequest::new("+1 (555) 123-4567", Some("whatsapp"));
//!     let artifact = service.generate(&request)?;
//!
//!     println!("{} -> {}", artifact.payload, artifact.filename);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod qr;
pub mod service;

// Re-exports for convenience
pub use error::{Error, ErrorKind, Result};

pub use config::{LogRotation, LoggingOptions, MetricsFormat, QrServeConfig, ServerOptions};
pub use http::{AppState, router};
pub use metrics::GenerationMetrics;
pub use qr::{EcLevel, QrEncoder, QrType, SymbolConfig, format_payload};
pub use service::{GenerationRequest, QrArtifact, QrService, StoredImage};
