//! Classified camera acquisition errors.

use thiserror::Error;

/// Errors that can occur while acquiring or driving a capture device.
///
/// Platform failures are always mapped into one of these kinds so callers
/// can show an actionable message instead of a raw platform string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera permission was denied")]
    PermissionDenied,
    #[error("no camera device was found")]
    DeviceNotFound,
    #[error("camera is in use by another application")]
    DeviceBusy,
    #[error("camera access requires a secure context")]
    InsecureContext,
    #[error("camera capture is not supported here")]
    Unsupported,
    #[error("camera error: {0}")]
    Unknown(String),
}

impl CameraError {
    /// Maps a platform error name (the `getUserMedia` DOMException names)
    /// and message to a camera error kind.
    pub fn from_platform(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => CameraError::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" | "OverconstrainedError" => {
                CameraError::DeviceNotFound
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => CameraError::DeviceBusy,
            "SecurityError" => CameraError::InsecureContext,
            "NotSupportedError" | "TypeError" => CameraError::Unsupported,
            _ => CameraError::Unknown(if message.is_empty() {
                name.to_string()
            } else {
                message.to_string()
            }),
        }
    }

    /// Best-effort classification of a free-form driver message.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission") || lower.contains("not allowed") || lower.contains("denied")
        {
            CameraError::PermissionDenied
        } else if lower.contains("busy") || lower.contains("in use") || lower.contains("not readable")
        {
            CameraError::DeviceBusy
        } else if lower.contains("not found") || lower.contains("no device") {
            CameraError::DeviceNotFound
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            CameraError::Unsupported
        } else {
            CameraError::Unknown(message.to_string())
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => "permission_denied",
            CameraError::DeviceNotFound => "device_not_found",
            CameraError::DeviceBusy => "device_busy",
            CameraError::InsecureContext => "insecure_context",
            CameraError::Unsupported => "unsupported",
            CameraError::Unknown(_) => "unknown",
        }
    }

    /// What the user can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => {
                "Allow camera access for this site in your browser settings, then try again."
            }
            CameraError::DeviceNotFound => "Connect a camera or switch to a device that has one.",
            CameraError::DeviceBusy => {
                "Close other applications or tabs that are using the camera, then try again."
            }
            CameraError::InsecureContext => {
                "Open the dashboard over HTTPS; browsers only allow cameras on secure pages."
            }
            CameraError::Unsupported => "This browser cannot use the camera. Try a current browser.",
            CameraError::Unknown(_) => "Unable to access the camera. Please check permissions.",
        }
    }

    /// Every camera failure falls back to typing the code by hand.
    pub fn offers_manual_fallback(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_names_are_classified() {
        assert_eq!(
            CameraError::from_platform("NotAllowedError", "Permission denied"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::from_platform("OverconstrainedError", ""),
            CameraError::DeviceNotFound
        );
        assert_eq!(
            CameraError::from_platform("NotReadableError", "Could not start video source"),
            CameraError::DeviceBusy
        );
        assert_eq!(
            CameraError::from_platform("SecurityError", ""),
            CameraError::InsecureContext
        );
        assert_eq!(
            CameraError::from_platform("TypeError", ""),
            CameraError::Unsupported
        );
    }

    #[test]
    fn test_unknown_keeps_message() {
        assert_eq!(
            CameraError::from_platform("WeirdError", "driver exploded"),
            CameraError::Unknown("driver exploded".into())
        );
        assert_eq!(
            CameraError::from_platform("WeirdError", ""),
            CameraError::Unknown("WeirdError".into())
        );
    }

    #[test]
    fn test_driver_messages() {
        assert_eq!(
            CameraError::from_message("Device or resource busy"),
            CameraError::DeviceBusy
        );
        assert_eq!(
            CameraError::from_message("camera permission denied by user"),
            CameraError::PermissionDenied
        );
    }

    #[test]
    fn test_every_kind_has_a_hint() {
        let kinds = [
            CameraError::PermissionDenied,
            CameraError::DeviceNotFound,
            CameraError::DeviceBusy,
            CameraError::InsecureContext,
            CameraError::Unsupported,
            CameraError::Unknown("x".into()),
        ];
        for kind in kinds {
            assert!(!kind.remediation().is_empty());
            assert!(kind.offers_manual_fallback());
        }
    }
}
