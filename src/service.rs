//! The QR service: validates requests, writes artifacts, reads them back

use crate::error::{Error, Result};
use crate::qr::{QrEncoder, QrType, SymbolConfig, format_payload};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// Tag used when a request does not name a type
pub const DEFAULT_QR_TYPE: &str = "general";

/// A client request to generate a code
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    /// Raw user input; surrounding whitespace is ignored
    #[serde(default)]
    pub data: String,
    /// Type tag as sent by the client (`general`, `whatsapp`, `email`, `location`)
    #[serde(rename = "type", default)]
    pub qr_type: Option<String>,
}

impl GenerationRequest {
    /// Convenience constructor
    pub fn new(data: impl Into<String>, qr_type: Option<&str>) -> Self {
        Self {
            data: data.into(),
            qr_type: qr_type.map(str::to_string),
        }
    }

    /// Type tag exactly as requested, defaulting to `general`
    pub fn type_tag(&self) -> &str {
        self.qr_type.as_deref().unwrap_or(DEFAULT_QR_TYPE)
    }
}

/// A generated image on disk
#[derive(Debug, Clone)]
pub struct QrArtifact {
    /// Bare file name inside the storage directory
    pub filename: String,
    /// Full path the image was written to
    pub storage_path: PathBuf,
    /// Local time used to derive the filename
    pub created_at: DateTime<Local>,
    /// String encoded in the symbol
    pub payload: String,
    /// Type tag as requested by the client
    pub qr_type: String,
}

/// Image bytes read back for download
#[derive(Debug, Clone)]
pub struct StoredImage {
    /// Bare file name
    pub filename: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl StoredImage {
    /// MIME type guessed from the file extension
    pub fn content_type(&self) -> &'static str {
        let is_png = Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png {
            "image/png"
        } else {
            "application/octet-stream"
        }
    }
}

/// Generates QR images into a single storage directory
#[derive(Debug)]
pub struct QrService {
    storage_dir: PathBuf,
    encoder: QrEncoder,
}

impl QrService {
    /// Create the service, creating `storage_dir` if it does not exist.
    pub fn new(storage_dir: impl Into<PathBuf>, symbol: SymbolConfig) -> Result<Self> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create storage directory {}: {e}",
                storage_dir.display()
            ))
        })?;

        Ok(Self {
            storage_dir,
            encoder: QrEncoder::with_config(symbol),
        })
    }

    /// Directory holding generated images
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Generate a code named after the current local time.
    pub fn generate(&self, request: &GenerationRequest) -> Result<QrArtifact> {
        self.generate_at(request, Local::now())
    }

    /// Generate a code named after `at`.
    ///
    /// Requests in the same second share a filename; the later write replaces
    /// the earlier file.
    pub fn generate_at(
        &self,
        request: &GenerationRequest,
        at: DateTime<Local>,
    ) -> Result<QrArtifact> {
        let data = request.data.trim();
        if data.is_empty() {
            return Err(Error::Validation("No data provided".to_string()));
        }

        let tag = request.type_tag();
        let qr_type = QrType::parse(tag);
        let filename = artifact_filename(&at);
        let storage_path = self.storage_dir.join(&filename);

        let payload = format_payload(data, qr_type);
        let payload = self
            .encoder
            .encode_to_file(&payload, &storage_path)
            .inspect_err(|err| {
                warn!(
                    filename = %filename,
                    qr_type = %qr_type,
                    kind = err.kind().as_str(),
                    error = %err,
                    "QR generation failed"
                );
            })?;

        info!(
            filename = %filename,
            qr_type = %qr_type,
            payload_len = payload.len(),
            "Generated QR code"
        );

        Ok(QrArtifact {
            filename,
            storage_path,
            created_at: at,
            payload,
            qr_type: tag.to_string(),
        })
    }

    /// Read a previously generated image by bare file name.
    pub fn open_artifact(&self, filename: &str) -> Result<StoredImage> {
        let path = self.resolve(filename)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(StoredImage {
                filename: filename.to_string(),
                bytes,
            }),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                Err(Error::NotFound(filename.to_string()))
            }
            Err(err) => Err(Error::NotFound(format!("{filename}: {err}"))),
        }
    }

    /// Map a file name onto the storage directory. Only a single plain path
    /// component is accepted.
    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.storage_dir.join(name)),
            _ => Err(Error::NotFound(filename.to_string())),
        }
    }
}

/// `qr_<YYYYMMDD_HHMMSS>.png`
pub fn artifact_filename(at: &DateTime<Local>) -> String {
    format!("qr_{}.png", at.format("%Y%m%d_%H%M%S"))
}
