//! User-visible outcome of a redemption.

use chrono::NaiveDateTime;

/// Why the backend (or local validation) refused a redemption.
///
/// Every reason is retryable: the user may correct the code, scan again or
/// pick another entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Malformed(String),
    Expired,
    AlreadyConsumed,
    NoFaceMatch,
    Other(String),
}

impl RejectReason {
    /// Classifies a backend `error` message.
    pub fn from_server_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("expired") {
            RejectReason::Expired
        } else if lower.contains("consumed") || lower.contains("already used") {
            RejectReason::AlreadyConsumed
        } else if lower.contains("unknown face") || lower.contains("no match") {
            RejectReason::NoFaceMatch
        } else if lower.contains("format") || lower.contains("required") {
            RejectReason::Malformed(message.to_string())
        } else {
            RejectReason::Other(message.to_string())
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RejectReason::Malformed(_) => "malformed",
            RejectReason::Expired => "expired",
            RejectReason::AlreadyConsumed => "consumed",
            RejectReason::NoFaceMatch => "no_match",
            RejectReason::Other(_) => "other",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Malformed(detail) => f.write_str(detail),
            RejectReason::Expired => f.write_str("Invalid or expired QR code"),
            RejectReason::AlreadyConsumed => f.write_str("This code has already been used"),
            RejectReason::NoFaceMatch => f.write_str("no match"),
            RejectReason::Other(detail) => f.write_str(detail),
        }
    }
}

/// Result of submitting one [`super::RedemptionAttempt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionResult {
    /// Newly marked.
    Accepted {
        name: Option<String>,
        status: String,
        marked_at: Option<NaiveDateTime>,
    },
    /// Already present before this attempt; not an error.
    AlreadyMarked {
        name: Option<String>,
        marked_at: Option<NaiveDateTime>,
    },
    /// Soft rejection, shown with the reason.
    Rejected { reason: RejectReason },
    /// Network or server failure, shown generically.
    TransportError { reason: String },
}

impl RedemptionResult {
    /// The student is now recorded as present.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RedemptionResult::Accepted { .. } | RedemptionResult::AlreadyMarked { .. }
        )
    }

    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RedemptionResult::Accepted { .. } => "accepted",
            RedemptionResult::AlreadyMarked { .. } => "already_marked",
            RedemptionResult::Rejected { reason } => reason.label(),
            RedemptionResult::TransportError { .. } => "transport_error",
        }
    }

    /// Message for the feedback banner.
    pub fn message(&self) -> String {
        match self {
            RedemptionResult::Accepted { name: Some(name), .. } => {
                format!("{name} - Attendance Marked")
            }
            RedemptionResult::Accepted { name: None, .. } => {
                "Attendance marked successfully!".to_string()
            }
            RedemptionResult::AlreadyMarked { name: Some(name), .. } => {
                format!("{name} - Attendance already marked")
            }
            RedemptionResult::AlreadyMarked { name: None, .. } => {
                "Attendance already marked".to_string()
            }
            RedemptionResult::Rejected {
                reason: RejectReason::NoFaceMatch,
            } => "Unknown face. Try again.".to_string(),
            RedemptionResult::Rejected { reason } => reason.to_string(),
            RedemptionResult::TransportError { .. } => {
                "Failed to mark attendance. Please try again.".to_string()
            }
        }
    }
}
