//! QR code encoder

use crate::error::{Error, Result};
use crate::qr::SymbolConfig;
use image::{GrayImage, ImageFormat, Luma, imageops};
use qrcode::types::QrError;
use qrcode::{QrCode, Version};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_VERSION: i16 = 40;

/// QR code encoder rendering black-on-white PNG symbols
#[derive(Debug, Clone, Default)]
pub struct QrEncoder {
    config: SymbolConfig,
}

impl QrEncoder {
    /// Create a new encoder with the default symbol settings (low ECC, 10px modules, 4 module border)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with explicit symbol settings
    pub fn with_config(config: SymbolConfig) -> Self {
        Self { config }
    }

    /// Symbol settings used by this encoder
    pub fn config(&self) -> &SymbolConfig {
        &self.config
    }

    /// Build the smallest symbol at or above `min_version` that fits the payload.
    fn build_code(&self, payload: &str) -> Result<QrCode> {
        let ec_level = self.config.ec_level.into();

        if self.config.min_version <= 1 {
            return QrCode::with_error_correction_level(payload.as_bytes(), ec_level)
                .map_err(Error::from);
        }

        for version in self.config.min_version..=MAX_VERSION {
            match QrCode::with_version(payload.as_bytes(), Version::Normal(version), ec_level) {
                Ok(code) => return Ok(code),
                Err(QrError::DataTooLong) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(QrError::DataTooLong.into())
    }

    /// Encode a payload into a grayscale image including the quiet zone
    pub fn render(&self, payload: &str) -> Result<GrayImage> {
        let code = self.build_code(payload)?;
        let module = self.config.module_size.max(1);

        let symbol = code
            .render::<Luma<u8>>()
            .quiet_zone(false)
            .module_dimensions(module, module)
            .build();

        let pad = self.config.border * module;
        let mut canvas = GrayImage::from_pixel(
            symbol.width() + 2 * pad,
            symbol.height() + 2 * pad,
            Luma([255]),
        );
        imageops::replace(&mut canvas, &symbol, i64::from(pad), i64::from(pad));

        tracing::debug!(
            version = ?code.version(),
            width = canvas.width(),
            payload_len = payload.len(),
            "Rendered QR symbol"
        );

        Ok(canvas)
    }

    /// Encode a payload and write it as a PNG to `dest`.
    ///
    /// The image is written to a temporary sibling and renamed into place, so
    /// once this returns `Ok` the file at `dest` is complete.
    pub fn encode_to_file(&self, payload: &str, dest: &Path) -> Result<String> {
        let image = self.render(payload)?;
        let tmp = temp_path_for(dest);

        let written = image
            .save_with_format(&tmp, ImageFormat::Png)
            .map_err(Error::from)
            .and_then(|()| fs::rename(&tmp, dest).map_err(Error::from));

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        Ok(payload.to_string())
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "qr".to_string());
    let tmp_name = format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple());
    dest.with_file_name(tmp_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::qr::EcLevel;

    fn decode(image: &GrayImage) -> String {
        let mut prepared = rqrr::PreparedImage::prepare(image.clone());
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one symbol");
        let (_meta, content) = grids[0].decode().expect("decode symbol");
        content
    }

    #[test]
    fn test_version_one_dimensions() {
        let encoder = QrEncoder::new();
        let image = encoder.render("hello").unwrap();
        // 21 modules + 2 * 4 border, 10px each
        assert_eq!(image.width(), 290);
        assert_eq!(image.height(), 290);
        assert_eq!(image.get_pixel(0, 0), &Luma([255]));
        // Top-left finder pattern starts right after the border
        assert_eq!(image.get_pixel(40, 40), &Luma([0]));
    }

    #[test]
    fn test_fit_grows_version() {
        let encoder = QrEncoder::new();
        let long = "x".repeat(200);
        let image = encoder.render(&long).unwrap();
        assert!(image.width() > 290);
    }

    #[test]
    fn test_min_version_respected() {
        let encoder = QrEncoder::with_config(SymbolConfig {
            min_version: 5,
            ec_level: EcLevel::M,
            module_size: 4,
            border: 2,
        });
        let image = encoder.render("hi").unwrap();
        // Version 5 has 37 modules per side
        assert_eq!(image.width(), (37 + 4) * 4);
    }

    #[test]
    fn test_round_trip() {
        let encoder = QrEncoder::new();
        let original = "mailto:someone@example.com";
        let image = encoder.render(original).unwrap();
        assert_eq!(decode(&image), original);
    }

    #[test]
    fn test_payload_too_long() {
        let encoder = QrEncoder::new();
        let huge = "a".repeat(8000);
        let err = encoder.render(&huge).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn test_encode_to_file_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("qr_test.png");
        let encoder = QrEncoder::new();

        let payload = encoder.encode_to_file("geo:1,2", &dest).unwrap();
        assert_eq!(payload, "geo:1,2");

        let bytes = fs::read(&dest).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let reloaded = image::open(&dest).unwrap().to_luma8();
        assert_eq!(decode(&reloaded), "geo:1,2");

        // Only the final file remains
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_encode_to_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("qr.png");
        let encoder = QrEncoder::new();

        let err = encoder.encode_to_file("hello", &dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!dest.exists());
    }
}
