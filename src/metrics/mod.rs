//! Prometheus counters for the attendance flow.
//!
//! # Metrics Exposed
//!
//! - `attendance_tokens_issued_total` - Tokens displayed on the teacher console
//! - `attendance_tokens_expired_total` - Displayed tokens whose countdown ran out
//! - `attendance_redemptions_total{method,outcome}` - Redemption attempts by entry point and result
//! - `attendance_camera_errors_total{kind}` - Camera acquisition failures by kind
//! - `attendance_scan_frames_total` - Frames handed to the QR decoder
//! - `attendance_refresh_failures_total` - Background roster/schedule refreshes that failed
//!
//! # Example
//!
//! ```no_run
//! use attendance_scan::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.record_redemption("qr", "accepted");
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, MetricsRegistry};
