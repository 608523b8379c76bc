//! qrserve runtime configuration handling

use crate::error::{Error, Result};
use crate::qr::{EcLevel, SymbolConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrServeConfig {
    /// HTTP listener and storage settings
    pub server: ServerOptions,
    /// QR symbol rendering settings
    pub qr: SymbolOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl QrServeConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            tracing::info!("Using configuration file: {}", path.display());
            Self::from_file(&path)?
        } else {
            tracing::debug!("No qrserve.toml / qrserve.yaml found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["qrserve.toml", "qrserve.yaml", "qrserve.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("qrserve");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{}', expected toml/yaml",
                other
            ))),
        }
    }

    /// Apply environment variable overrides after file/default loading.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides using an arbitrary key lookup instead of the process environment.
    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.server.apply_overrides(&lookup);
        self.qr.apply_overrides(&lookup);
        self.logging.apply_overrides(&lookup);
    }

    /// Produce a validated symbol configuration for the encoder.
    pub fn symbol_config(&self) -> Result<SymbolConfig> {
        self.qr.to_symbol_config()
    }
}

/// HTTP listener and artifact storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Bind address for the HTTP listener
    pub bind_address: String,
    /// Bind port for the HTTP listener (`PORT` env var)
    pub port: u16,
    /// Directory holding generated images
    pub storage_dir: PathBuf,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5001,
            storage_dir: PathBuf::from("static/qr_codes"),
        }
    }
}

impl ServerOptions {
    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("QRSERVE_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(port) = lookup("PORT") {
            if let Ok(parsed) = port.trim().parse::<u16>() {
                self.port = parsed;
            } else {
                tracing::warn!("Ignoring invalid PORT value '{port}'");
            }
        }
        if let Some(dir) = lookup("QRSERVE_STORAGE_DIR") {
            if !dir.trim().is_empty() {
                self.storage_dir = PathBuf::from(dir);
            }
        }
    }

    /// Socket address helper for binding servers
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// User-facing QR rendering overrides, validated into a [`SymbolConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolOptions {
    /// Smallest symbol version to try (1-40)
    pub min_version: i16,
    /// Error correction level
    pub ec_level: EcLevel,
    /// Pixels per module
    pub module_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
}

impl Default for SymbolOptions {
    fn default() -> Self {
        let defaults = SymbolConfig::default();
        Self {
            min_version: defaults.min_version,
            ec_level: defaults.ec_level,
            module_size: defaults.module_size,
            border: defaults.border,
        }
    }
}

impl SymbolOptions {
    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(version) = lookup("QRSERVE_QR_MIN_VERSION") {
            if let Ok(parsed) = version.parse::<i16>() {
                self.min_version = parsed;
            }
        }
        if let Some(level) = lookup("QRSERVE_QR_EC_LEVEL") {
            if let Ok(parsed) = level.parse::<EcLevel>() {
                self.ec_level = parsed;
            }
        }
        if let Some(size) = lookup("QRSERVE_QR_MODULE_SIZE") {
            if let Ok(parsed) = size.parse::<u32>() {
                self.module_size = parsed;
            }
        }
        if let Some(border) = lookup("QRSERVE_QR_BORDER") {
            if let Ok(parsed) = border.parse::<u32>() {
                self.border = parsed;
            }
        }
    }

    /// Validate the overrides into an encoder configuration.
    pub fn to_symbol_config(&self) -> Result<SymbolConfig> {
        if !(1..=40).contains(&self.min_version) {
            return Err(Error::Config(format!(
                "QR min_version must be between 1 and 40, got {}",
                self.min_version
            )));
        }
        if self.module_size == 0 {
            return Err(Error::Config("QR module_size must be at least 1".to_string()));
        }

        Ok(SymbolConfig {
            min_version: self.min_version,
            ec_level: self.ec_level,
            module_size: self.module_size,
            border: self.border,
        })
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `QRSERVE_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in stdout logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
    /// Interval in seconds between generation metrics summaries
    pub metrics_interval_secs: u64,
    /// Output format for the `/metrics` endpoint (`json` or `prometheus`)
    pub metrics_format: MetricsFormat,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
            metrics_interval_secs: 60,
            metrics_format: MetricsFormat::Json,
        }
    }
}

impl LoggingOptions {
    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("QRSERVE_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(file) = lookup("QRSERVE_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Some(color) = lookup("QRSERVE_LOG_COLOR") {
            match color.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" => self.color = false,
                "1" | "true" | "on" => self.color = true,
                _ => {}
            }
        }
        if let Some(rotation) = lookup("QRSERVE_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::from_str(&rotation) {
                self.rotation = Some(parsed);
            }
        }
        if let Some(interval) = lookup("QRSERVE_METRICS_INTERVAL") {
            if let Ok(value) = interval.parse::<u64>() {
                self.metrics_interval_secs = value.max(5);
            }
        }
        if let Some(format) = lookup("QRSERVE_METRICS_FORMAT") {
            if let Ok(parsed) = format.parse::<MetricsFormat>() {
                self.metrics_format = parsed;
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn from_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

/// Supported serialization formats for the metrics endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsFormat {
    /// Emit metrics as structured JSON
    Json,
    /// Emit metrics in Prometheus text exposition format
    Prometheus,
}

impl FromStr for MetricsFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "prometheus" => Ok(Self::Prometheus),
            _ => Err(format!(
                "Unsupported metrics format '{value}', expected 'json' or 'prometheus'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_service_contract() {
        let config = QrServeConfig::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.server.storage_dir, PathBuf::from("static/qr_codes"));
        assert_eq!(config.server.socket_address(), "0.0.0.0:5001");

        let symbol = config.symbol_config().unwrap();
        assert_eq!(symbol.min_version, 1);
        assert_eq!(symbol.ec_level, EcLevel::L);
        assert_eq!(symbol.module_size, 10);
        assert_eq!(symbol.border, 4);
    }

    #[test]
    fn test_port_env_override() {
        let mut config = QrServeConfig::default();
        config.apply_overrides_from(lookup_from(&[("PORT", "8080")]));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = QrServeConfig::default();
        config.apply_overrides_from(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, 5001);
    }

    #[test]
    fn test_storage_and_symbol_overrides() {
        let mut config = QrServeConfig::default();
        config.apply_overrides_from(lookup_from(&[
            ("QRSERVE_STORAGE_DIR", "/var/lib/qrserve"),
            ("QRSERVE_QR_EC_LEVEL", "h"),
            ("QRSERVE_QR_BORDER", "2"),
            ("QRSERVE_METRICS_FORMAT", "prometheus"),
            ("QRSERVE_METRICS_INTERVAL", "1"),
        ]));
        assert_eq!(config.server.storage_dir, PathBuf::from("/var/lib/qrserve"));
        assert_eq!(config.qr.ec_level, EcLevel::H);
        assert_eq!(config.qr.border, 2);
        assert_eq!(config.logging.metrics_format, MetricsFormat::Prometheus);
        assert_eq!(config.logging.metrics_interval_secs, 5);
    }

    #[test]
    fn test_symbol_validation() {
        let mut options = SymbolOptions::default();
        options.min_version = 41;
        assert!(matches!(options.to_symbol_config(), Err(Error::Config(_))));

        options.min_version = 3;
        options.module_size = 0;
        assert!(matches!(options.to_symbol_config(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrserve.toml");
        fs::write(
            &path,
            r#"
[server]
port = 9000
storage_dir = "out"

[qr]
ec_level = "M"
module_size = 6

[logging]
rotation = "daily"
"#,
        )
        .unwrap();

        let config = QrServeConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.storage_dir, PathBuf::from("out"));
        assert_eq!(config.qr.ec_level, EcLevel::M);
        assert_eq!(config.qr.module_size, 6);
        assert_eq!(config.qr.border, 4);
        assert_eq!(config.logging.rotation, Some(LogRotation::Daily));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrserve.yaml");
        fs::write(&path, "server:\n  port: 7000\nlogging:\n  level: debug\n").unwrap();

        let config = QrServeConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrserve.ini");
        fs::write(&path, "port=1").unwrap();
        assert!(matches!(
            QrServeConfig::from_file(&path),
            Err(Error::Config(_))
        ));
    }
}
