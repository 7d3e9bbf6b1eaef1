//! The token shown on the teacher console.

use crate::backend::{IssuedToken, SessionId};
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// A token received from the backend and held for display.
///
/// The backend decides whether the token is still valid; `expires_at` only
/// mirrors the time-to-live it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceToken {
    pub credential: String,
    pub session_id: SessionId,
    pub issued_at: DateTime<Utc>,
    pub ttl_secs: u64,
    /// Scannable image reference (`data:<mime>;base64,<payload>`).
    pub image: String,
    pub manual_code: Option<String>,
}

impl AttendanceToken {
    pub fn from_issued(issued: IssuedToken, session_id: SessionId, issued_at: DateTime<Utc>) -> Self {
        Self {
            credential: issued.credential,
            session_id,
            issued_at,
            ttl_secs: issued.ttl_secs,
            image: issued.image,
            manual_code: issued.manual_code,
        }
    }

    /// Code shown under the image for students who cannot scan.
    ///
    /// Prefers the short manual code; older backends only return the
    /// credential itself.
    pub fn fallback_code(&self) -> &str {
        self.manual_code.as_deref().unwrap_or(&self.credential)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = ChronoDuration::seconds(self.ttl_secs.min(u64::from(u32::MAX)) as i64);
        self.issued_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Decodes the image reference for saving to disk.
    ///
    /// Returns `None` when the reference is not a base64 data URL.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        let (header, payload) = self.image.strip_prefix("data:")?.split_once(',')?;
        if !header.ends_with(";base64") {
            return None;
        }
        base64::engine::general_purpose::STANDARD.decode(payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(manual_code: Option<&str>, image: &str) -> AttendanceToken {
        AttendanceToken {
            credential: "eyJhbGciOiJIUzI1NiJ9.payload.sig".into(),
            session_id: SessionId(3),
            issued_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            ttl_secs: 300,
            image: image.into(),
            manual_code: manual_code.map(str::to_string),
        }
    }

    #[test]
    fn test_fallback_code_prefers_manual_code() {
        assert_eq!(token(Some("K4Q9ZP"), "").fallback_code(), "K4Q9ZP");
        assert_eq!(
            token(None, "").fallback_code(),
            "eyJhbGciOiJIUzI1NiJ9.payload.sig"
        );
    }

    #[test]
    fn test_expires_at() {
        let t = token(None, "");
        assert_eq!((t.expires_at() - t.issued_at).num_seconds(), 300);
    }

    #[test]
    fn test_image_bytes() {
        let t = token(None, "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(
            t.image_bytes().unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]
        );
        assert_eq!(token(None, "https://example.test/qr.png").image_bytes(), None);
        assert_eq!(token(None, "data:image/svg+xml,<svg/>").image_bytes(), None);
    }
}
