//! Attendance Scan Library
//!
//! Client side of a school attendance dashboard: teachers put a short-lived
//! QR code on screen, students mark themselves present by scanning it,
//! typing its short code or showing their face to the camera.
//!
//! # Architecture
//!
//! ```text
//! teacher:  orchestrator::TeacherConsole → backend (issue) → clock (countdown)
//! student:  capture → scan → redeem → backend (mark) → orchestrator (refresh)
//! ```
//!
//! # Design Principles
//!
//! - **Server-side validity**: the countdown only mirrors the token's TTL;
//!   the backend decides what is still redeemable
//! - **One device per modal**: the capture device is released on every exit path
//! - **One call per action**: no redemption is ever retried automatically
//! - **Nothing is fatal**: every failure leaves a retryable state behind
//!
//! # Example
//!
//! ```no_run
//! use attendance_scan::{
//!     backend::{InMemoryBackend, SessionId},
//!     capture::{CameraSessionManager, MockCamera},
//!     config::FileConfig,
//!     orchestrator::{StudentConsole, TeacherConsole},
//!     scan::FnDecoder,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(InMemoryBackend::new());
//! backend.add_session(SessionId(1), "Physics", "Ms. Iyer");
//! backend.enroll(SessionId(1), "Asha", "12", "10-A");
//! backend.sign_in("Asha");
//!
//! let mut teacher = TeacherConsole::new(backend.clone(), Duration::from_secs(30));
//! let token = teacher.generate_token(SessionId(1), None).await?;
//!
//! let mut student = StudentConsole::new(
//!     backend,
//!     CameraSessionManager::new(MockCamera::new()),
//!     FnDecoder(|_: &attendance_scan::capture::Frame| None),
//!     &FileConfig::default(),
//! );
//! student.open_manual_entry();
//! let result = student.submit_manual(token.fallback_code()).await?;
//! println!("{}", result.message());
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod backend;
pub mod capture;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod redeem;
pub mod scan;

// Re-export commonly used types at crate root
pub use backend::{AttendanceBackend, BackendError, HttpBackend, InMemoryBackend, SessionId};
pub use capture::{CameraError, CameraSessionManager, Frame, MockCamera};
pub use clock::{ClockEvent, TokenClock};
pub use config::{ConfigError, FileConfig};
pub use orchestrator::{AttendanceToken, ConsoleError, ModalState, StudentConsole, TeacherConsole};
pub use redeem::{Credential, RedemptionAttempt, RedemptionClient, RedemptionResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
