//! Redemption inputs and the credential format-sniffing policy.

use crate::backend::SessionId;
use crate::capture::Frame;
use base64::Engine;
use thiserror::Error;

/// Prefix of the payload encoded into attendance QR codes:
/// `attendance:<credential>:<reference>`.
pub const ATTENDANCE_PREFIX: &str = "attendance:";

/// Longest value treated as a manual short code.
pub const MANUAL_CODE_MAX_LEN: usize = 6;

/// Why a typed or scanned value could not be turned into a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCode {
    #[error("please enter a code")]
    Empty,
    #[error("invalid QR code format")]
    BadLayout,
}

/// A value the backend can redeem, tagged with the lookup it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Long-form credential, sent on the `qr_token` field.
    Token(String),
    /// Short human-typed code, sent on the `manual_code` field.
    ManualCode(String),
}

impl Credential {
    /// Classifies a scanned or typed value.
    ///
    /// The policy is positional, not content-based, and must stay that way:
    ///
    /// 1. A value starting with [`ATTENDANCE_PREFIX`] must have exactly the
    ///    three `:`-separated parts `attendance`, credential, reference; only
    ///    the credential is kept, as a [`Credential::Token`].
    /// 2. Otherwise a value of at most [`MANUAL_CODE_MAX_LEN`] characters is a
    ///    [`Credential::ManualCode`], looked up in the short-code table.
    /// 3. Anything longer is a [`Credential::Token`] sent verbatim.
    ///
    /// Surrounding whitespace is ignored. Empty input and prefixed values
    /// with the wrong layout are malformed.
    pub fn sniff(raw: &str) -> Result<Self, MalformedCode> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(MalformedCode::Empty);
        }

        if value.starts_with(ATTENDANCE_PREFIX) {
            let parts: Vec<&str> = value.split(':').collect();
            return match parts.as_slice() {
                [_, credential, _] if !credential.is_empty() => {
                    Ok(Credential::Token((*credential).to_string()))
                }
                _ => Err(MalformedCode::BadLayout),
            };
        }

        if value.chars().count() <= MANUAL_CODE_MAX_LEN {
            Ok(Credential::ManualCode(value.to_string()))
        } else {
            Ok(Credential::Token(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Credential::Token(s) | Credential::ManualCode(s) => s,
        }
    }
}

/// A still frame encoded for the recognition endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct FaceImage {
    data_url: String,
}

impl FaceImage {
    /// Encodes `frame` as a JPEG data URL.
    pub fn from_frame(frame: &Frame, jpeg_quality: u8) -> Result<Self, image::ImageError> {
        let jpeg = frame.encode_jpeg(jpeg_quality)?;
        Ok(Self {
            data_url: format!(
                "data:image/jpeg;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(jpeg)
            ),
        })
    }

    /// Wraps an already encoded data URL.
    pub fn from_data_url(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

impl std::fmt::Debug for FaceImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceImage")
            .field("data_url_len", &self.data_url.len())
            .finish()
    }
}

/// One user action that asks the backend to mark attendance.
///
/// Consumed by [`super::RedemptionClient::submit`], so an attempt can only
/// ever be sent once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionAttempt {
    /// Raw text decoded from a QR code.
    QrPayload(String),
    /// Text typed into the manual entry field.
    ManualCode(String),
    /// Face still for a given session.
    FaceImage {
        image: FaceImage,
        session_id: SessionId,
    },
}

impl RedemptionAttempt {
    /// Entry point label used for logs and metrics.
    pub fn method(&self) -> &'static str {
        match self {
            RedemptionAttempt::QrPayload(_) => "qr",
            RedemptionAttempt::ManualCode(_) => "manual",
            RedemptionAttempt::FaceImage { .. } => "face",
        }
    }
}
