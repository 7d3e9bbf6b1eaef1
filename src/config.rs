//! File-based configuration.
//!
//! Every section has defaults, so an empty file (or none at all) yields a
//! usable configuration pointed at a local backend.

use crate::capture::CaptureConstraints;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid scan interval (must be 1-1000 ms)")]
    InvalidScanInterval,
    #[error("invalid JPEG quality (must be 1-100)")]
    InvalidJpegQuality,
    #[error("invalid backend url: {0}")]
    InvalidBackendUrl(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub face: FaceConfig,
    #[serde(default)]
    pub roster: RosterConfig,
}

/// REST backend location and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://school.example/`.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer token issued by the login flow.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/".to_string(),
            timeout_secs: 10,
            auth_token: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Camera constraints per entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Used when scanning a QR code.
    pub scan: CaptureConstraints,
    /// Used when taking a face still.
    pub face: CaptureConstraints,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            scan: CaptureConstraints::scanning(),
            face: CaptureConstraints::face(),
        }
    }
}

/// QR decode loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Delay between sampling attempts. 16 ms follows a 60 Hz display.
    pub frame_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

impl ScanConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Face still settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceConfig {
    pub jpeg_quality: u8,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

/// Live roster refresh on the teacher dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Seconds between automatic refreshes.
    pub refresh_interval_secs: u64,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
        }
    }
}

impl RosterConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.backend.base_url)
            .map_err(|e| ConfigError::InvalidBackendUrl(e.to_string()))?;
        self.capture.scan.validate()?;
        self.capture.face.validate()?;
        if self.scan.frame_interval_ms == 0 || self.scan.frame_interval_ms > 1000 {
            return Err(ConfigError::InvalidScanInterval);
        }
        if self.face.jpeg_quality == 0 || self.face.jpeg_quality > 100 {
            return Err(ConfigError::InvalidJpegQuality);
        }
        Ok(())
    }
}
