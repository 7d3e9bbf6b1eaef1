//! Camera acquisition and frame handling.
//!
//! This module owns the capture device lifecycle: requesting a video-only
//! stream, binding it to a preview, sampling frames, and releasing the
//! device on every exit path. Platform errors are classified into
//! [`CameraError`] kinds before they leave this module.

mod camera;
mod constraints;
mod error;
mod frame;
#[cfg(feature = "camera")]
mod native;
mod session;

pub use camera::{CameraBackend, MockCamera, VideoStream};
pub use constraints::{CaptureConstraints, FacingMode};
pub use error::CameraError;
pub use frame::{Frame, PixelFormat};
#[cfg(feature = "camera")]
pub use native::NativeCamera;
pub use session::{CameraSessionManager, HeadlessPreview, PreviewSurface};
