//! Video capture constraints.
//!
//! Capture is always video-only. QR scanning prefers the rear camera,
//! face capture the front one.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed at a displayed QR code.
    Environment,
    /// Front camera, pointed at the user.
    User,
}

/// Constraints passed when requesting a capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    /// Preferred camera orientation.
    pub facing: FacingMode,
    /// Ideal frame width in pixels.
    pub width: u32,
    /// Ideal frame height in pixels.
    pub height: u32,
    /// Ideal frames per second.
    pub frame_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::scanning()
    }
}

impl CaptureConstraints {
    /// Constraints for scanning a QR code shown on the teacher's screen.
    pub fn scanning() -> Self {
        Self {
            facing: FacingMode::Environment,
            width: 640,
            height: 480,
            frame_rate: 30,
        }
    }

    /// Constraints for a face still.
    pub fn face() -> Self {
        Self {
            facing: FacingMode::User,
            ..Self::scanning()
        }
    }

    /// Validates the constraint values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}
