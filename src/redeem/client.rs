//! Turns redemption attempts into backend calls.

use super::{Credential, RedemptionAttempt, RedemptionResult, RejectReason};
use crate::backend::{AttendanceBackend, FaceMatchReply, RedeemReply};
use crate::metrics::MetricsRegistry;
use std::sync::Arc;

/// Submits redemption attempts, one backend call per attempt.
///
/// There is no retry of any kind. A slow request that eventually succeeds
/// must not race a second copy of itself.
#[derive(Clone)]
pub struct RedemptionClient {
    backend: Arc<dyn AttendanceBackend>,
    metrics: Option<MetricsRegistry>,
}

impl RedemptionClient {
    pub fn new(backend: Arc<dyn AttendanceBackend>) -> Self {
        Self {
            backend,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Submits one attempt and interprets the reply.
    pub async fn submit(&self, attempt: RedemptionAttempt) -> RedemptionResult {
        let method = attempt.method();
        let result = match attempt {
            RedemptionAttempt::QrPayload(raw) | RedemptionAttempt::ManualCode(raw) => {
                self.redeem_text(&raw).await
            }
            RedemptionAttempt::FaceImage { image, session_id } => {
                match self.backend.recognize_face(&image, session_id).await {
                    Ok(reply) => interpret_face(reply),
                    Err(e) => RedemptionResult::TransportError {
                        reason: e.to_string(),
                    },
                }
            }
        };

        match &result {
            RedemptionResult::TransportError { reason } => {
                tracing::warn!(method, reason = %reason, "attendance submission failed");
            }
            other => {
                tracing::info!(method, outcome = other.label(), "attendance submission finished");
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_redemption(method, result.label());
        }
        result
    }

    async fn redeem_text(&self, raw: &str) -> RedemptionResult {
        let credential = match Credential::sniff(raw) {
            Ok(credential) => credential,
            Err(e) => {
                return RedemptionResult::Rejected {
                    reason: RejectReason::Malformed(e.to_string()),
                }
            }
        };

        match self.backend.redeem_credential(&credential).await {
            Ok(RedeemReply::Marked(record)) => RedemptionResult::Accepted {
                name: record.name,
                status: record.status,
                marked_at: record.marked_at,
            },
            Ok(RedeemReply::AlreadyMarked(record)) => RedemptionResult::AlreadyMarked {
                name: record.name,
                marked_at: record.marked_at,
            },
            Ok(RedeemReply::Rejected(message)) => RedemptionResult::Rejected {
                reason: RejectReason::from_server_message(&message),
            },
            Err(e) => RedemptionResult::TransportError {
                reason: e.to_string(),
            },
        }
    }
}

fn interpret_face(reply: FaceMatchReply) -> RedemptionResult {
    if reply.is_repeat() {
        return RedemptionResult::AlreadyMarked {
            name: reply.name,
            marked_at: reply.marked_at,
        };
    }
    if reply.matched {
        return RedemptionResult::Accepted {
            name: reply.name,
            status: "present".to_string(),
            marked_at: reply.marked_at,
        };
    }

    let reason = match reply.reason.as_deref() {
        None => RejectReason::NoFaceMatch,
        Some(message) => match RejectReason::from_server_message(message) {
            RejectReason::Other(_) if message.to_ascii_lowercase().contains("face") => {
                RejectReason::NoFaceMatch
            }
            reason => reason,
        },
    };
    RedemptionResult::Rejected { reason }
}

impl std::fmt::Debug for RedemptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedemptionClient")
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
