//! The REST backend as seen by the attendance flow.
//!
//! Token issuance, matching and persistence all happen server-side; this
//! module only describes the calls the dashboards make and the replies they
//! get back. [`HttpBackend`] speaks the real JSON API, [`InMemoryBackend`]
//! stands in for it in tests and the demo.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::redeem::{Credential, FaceImage};

/// Identifier of a scheduled class session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),
    #[error("not signed in or session expired")]
    Unauthorized,
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Token issued for a class session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Scannable image, as a `data:image/png;base64,...` reference.
    #[serde(rename = "qr_code")]
    pub image: String,
    /// Long-form credential embedded in the image.
    #[serde(rename = "jwt", alias = "qr_token")]
    pub credential: String,
    /// Seconds until the backend stops accepting the token.
    #[serde(rename = "expires_in")]
    pub ttl_secs: u64,
    /// Short code for typing by hand, when the backend issues one.
    #[serde(default)]
    pub manual_code: Option<String>,
}

/// A recorded attendance mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "present")]
    pub status: String,
    #[serde(default)]
    pub marked_at: Option<NaiveDateTime>,
}

fn present() -> String {
    "present".to_string()
}

/// Reply to a credential or manual code redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemReply {
    Marked(MarkRecord),
    /// The student was already present; the original mark is untouched.
    AlreadyMarked(MarkRecord),
    Rejected(String),
}

/// Reply to a face recognition request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceMatchReply {
    #[serde(rename = "match")]
    pub matched: bool,
    #[serde(default)]
    pub already_marked: bool,
    #[serde(default)]
    pub newly_marked: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub marked_at: Option<NaiveDateTime>,
    #[serde(default, alias = "error")]
    pub reason: Option<String>,
}

impl FaceMatchReply {
    /// Matched, but the student had been marked before this request.
    pub fn is_repeat(&self) -> bool {
        self.matched && (self.already_marked || self.newly_marked == Some(false))
    }
}

/// One student's status in a session roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_name: String,
    #[serde(default)]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub marked_at: Option<NaiveDateTime>,
}

impl RosterEntry {
    pub fn is_present(&self) -> bool {
        matches!(self.status.as_deref(), Some("present") | Some("late"))
    }
}

/// A session on the signed-in student's schedule for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: SessionId,
    pub subject: String,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub attendance_method: Option<String>,
    #[serde(default)]
    pub attendance_status: Option<String>,
    #[serde(default)]
    pub marked_at: Option<NaiveDateTime>,
}

impl ScheduleEntry {
    pub fn is_present(&self) -> bool {
        self.attendance_status.as_deref() == Some("present")
    }
}

/// Calls the attendance flow makes against the backend.
///
/// Implementations must not retry: a request that may have reached the
/// server is reported back to the caller as-is.
#[async_trait]
pub trait AttendanceBackend: Send + Sync {
    /// Issues a token for a session, superseding the displayed one.
    async fn issue_token(
        &self,
        session_id: SessionId,
        subject: Option<&str>,
    ) -> Result<IssuedToken, BackendError>;

    /// Marks the signed-in student present using a credential or short code.
    async fn redeem_credential(&self, credential: &Credential)
        -> Result<RedeemReply, BackendError>;

    /// Marks whoever is in the picture present for `session_id`.
    async fn recognize_face(
        &self,
        image: &FaceImage,
        session_id: SessionId,
    ) -> Result<FaceMatchReply, BackendError>;

    /// Current per-student status for a session.
    async fn session_roster(&self, session_id: SessionId) -> Result<Vec<RosterEntry>, BackendError>;

    /// Today's sessions for the signed-in student.
    async fn today_schedule(&self) -> Result<Vec<ScheduleEntry>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_accepts_both_credential_names() {
        let jwt: IssuedToken = serde_json::from_str(
            r#"{"qr_code":"data:image/png;base64,AA==","jwt":"abc","expires_in":300}"#,
        )
        .unwrap();
        assert_eq!(jwt.credential, "abc");
        assert_eq!(jwt.ttl_secs, 300);
        assert_eq!(jwt.manual_code, None);

        let legacy: IssuedToken = serde_json::from_str(
            r#"{"qr_code":"x","qr_token":"def","expires_in":3600,"manual_code":"K4Q9ZP"}"#,
        )
        .unwrap();
        assert_eq!(legacy.credential, "def");
        assert_eq!(legacy.manual_code.as_deref(), Some("K4Q9ZP"));
    }

    #[test]
    fn test_roster_entry_parses_naive_timestamps() {
        let entry: RosterEntry = serde_json::from_str(
            r#"{"student_name":"Asha","roll_no":"12","class_name":"10-A",
                "status":"present","marked_at":"2025-09-18T09:05:11.123456"}"#,
        )
        .unwrap();
        assert!(entry.is_present());
        assert!(entry.marked_at.is_some());
    }

    #[test]
    fn test_face_reply_repeat_detection() {
        let reply: FaceMatchReply =
            serde_json::from_str(r#"{"match":true,"name":"Asha","already_marked":true}"#).unwrap();
        assert!(reply.is_repeat());

        let reply: FaceMatchReply =
            serde_json::from_str(r#"{"match":true,"name":"Asha","newly_marked":false}"#).unwrap();
        assert!(reply.is_repeat());

        let reply: FaceMatchReply =
            serde_json::from_str(r#"{"match":false,"error":"Unknown face"}"#).unwrap();
        assert!(!reply.is_repeat());
        assert_eq!(reply.reason.as_deref(), Some("Unknown face"));
    }
}
