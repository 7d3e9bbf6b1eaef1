//! Attendance redemption.
//!
//! Three entry points (a scanned QR payload, a typed code, a face still)
//! converge here on exactly one backend call each. The interesting part is
//! [`Credential::sniff`], which decides how a scanned or typed value is
//! sent.

mod attempt;
mod client;
mod outcome;

pub use attempt::{
    Credential, FaceImage, MalformedCode, RedemptionAttempt, ATTENDANCE_PREFIX,
    MANUAL_CODE_MAX_LEN,
};
pub use client::RedemptionClient;
pub use outcome::{RedemptionResult, RejectReason};
