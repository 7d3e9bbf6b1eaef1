//! Dashboard state for both sides of the attendance flow.
//!
//! [`TeacherConsole`] issues tokens and keeps the countdown and roster
//! current. [`StudentConsole`] drives the three entry points (scan, typed
//! code, face) through one modal that owns the capture device.

mod student;
mod teacher;
mod token;

pub use student::{ModalKind, ModalState, ScheduleSummary, StudentConsole};
pub use teacher::{TeacherConsole, TeacherEvent, TokenDisplay};
pub use token::AttendanceToken;

use crate::backend::BackendError;
use crate::capture::CameraError;
use thiserror::Error;

/// Errors returned by console commands.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("no session selected")]
    NoSessionSelected,

    #[error("cannot {action} while the modal is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("camera has no picture yet")]
    NoFrame,

    #[error("failed to encode face still: {0}")]
    Encode(#[from] image::ImageError),
}
