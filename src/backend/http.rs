//! JSON-over-HTTP client for the attendance REST API.

use super::{
    AttendanceBackend, BackendError, FaceMatchReply, IssuedToken, MarkRecord, RedeemReply,
    RosterEntry, ScheduleEntry, SessionId,
};
use crate::config::BackendConfig;
use crate::redeem::{Credential, FaceImage};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
struct IssueRequest<'a> {
    subject: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum RedeemRequest<'a> {
    QrToken(&'a str),
    ManualCode(&'a str),
}

#[derive(Debug, Serialize)]
struct FaceRequest<'a> {
    image: &'a str,
    session_id: SessionId,
}

/// Body of a mark-attendance reply, success or not.
#[derive(Debug, Default, Deserialize)]
struct MarkBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    marked_at: Option<NaiveDateTime>,
    #[serde(default)]
    already_marked: bool,
}

impl MarkBody {
    fn record(self) -> MarkRecord {
        MarkRecord {
            name: self.name,
            status: self.status.unwrap_or_else(|| "present".to_string()),
            marked_at: self.marked_at,
        }
    }

    fn reason(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "Failed to mark attendance".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RosterBody {
    attendance: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
struct ScheduleBody {
    sessions: Vec<ScheduleEntry>,
}

fn is_already_marked(message: &str) -> bool {
    message.to_ascii_lowercase().contains("already marked")
}

fn network(e: reqwest::Error) -> BackendError {
    BackendError::Network(e.to_string())
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error.or(body.message))
        .unwrap_or_else(|| status.to_string())
}

/// Fails on auth and server errors; passes everything else through.
async fn check_fatal(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BackendError::Unauthorized);
    }
    if status.is_server_error() {
        return Err(BackendError::Server {
            status: status.as_u16(),
            message: error_message(response).await,
        });
    }
    Ok(response)
}

/// Attendance backend reached over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| BackendError::Decode(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(network)?;
        Ok(Self {
            http,
            base_url,
            auth_token: None,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let backend = Self::new(&config.base_url, config.timeout())?;
        Ok(match &config.auth_token {
            Some(token) => backend.with_auth_token(token.clone()),
            None => backend,
        })
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(network)?;
        let response = check_fatal(response).await?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(error_message(response).await));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AttendanceBackend for HttpBackend {
    async fn issue_token(
        &self,
        session_id: SessionId,
        subject: Option<&str>,
    ) -> Result<IssuedToken, BackendError> {
        let url = self.url(&format!("api/teacher/session/{session_id}/generate_qr"))?;
        let response = self
            .request(Method::POST, url)
            .json(&IssueRequest { subject })
            .send()
            .await
            .map_err(network)?;
        let response = check_fatal(response).await?;
        if !response.status().is_success() {
            return Err(BackendError::Rejected(error_message(response).await));
        }
        response
            .json::<IssuedToken>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn redeem_credential(
        &self,
        credential: &Credential,
    ) -> Result<RedeemReply, BackendError> {
        let body = match credential {
            Credential::Token(token) => RedeemRequest::QrToken(token),
            Credential::ManualCode(code) => RedeemRequest::ManualCode(code),
        };
        let url = self.url("api/attendance/mark-qr")?;
        let response = self
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        let response = check_fatal(response).await?;

        let status = response.status();
        if status.is_success() {
            let mark = response
                .json::<MarkBody>()
                .await
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            return Ok(if mark.already_marked {
                RedeemReply::AlreadyMarked(mark.record())
            } else {
                RedeemReply::Marked(mark.record())
            });
        }

        // Rejection bodies vary; a missing reason falls back to the default.
        let mark = response.json::<MarkBody>().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || is_already_marked(&mark.reason()) {
            return Ok(RedeemReply::AlreadyMarked(mark.record()));
        }
        Ok(RedeemReply::Rejected(mark.reason()))
    }

    async fn recognize_face(
        &self,
        image: &FaceImage,
        session_id: SessionId,
    ) -> Result<FaceMatchReply, BackendError> {
        let url = self.url("api/ai/recognize_face")?;
        let response = self
            .request(Method::POST, url)
            .json(&FaceRequest {
                image: image.data_url(),
                session_id,
            })
            .send()
            .await
            .map_err(network)?;
        let response = check_fatal(response).await?;

        if !response.status().is_success() {
            return Ok(FaceMatchReply {
                reason: Some(error_message(response).await),
                ..Default::default()
            });
        }
        response
            .json::<FaceMatchReply>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn session_roster(&self, session_id: SessionId) -> Result<Vec<RosterEntry>, BackendError> {
        let mut url = self.url("api/teacher/attendance/live")?;
        url.query_pairs_mut()
            .append_pair("session_id", &session_id.to_string());
        let body: RosterBody = self.get_json(url).await?;
        Ok(body.attendance)
    }

    async fn today_schedule(&self) -> Result<Vec<ScheduleEntry>, BackendError> {
        let url = self.url("api/attendance/sessions/today")?;
        let body: ScheduleBody = self.get_json(url).await?;
        Ok(body.sessions)
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.auth_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn mark(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let marked = json!({
            "message": "Attendance marked successfully",
            "status": "present",
            "marked_at": "2025-09-18T09:05:11.123456"
        });
        match (body["qr_token"].as_str(), body["manual_code"].as_str()) {
            (Some("GOOD-CREDENTIAL"), None) => (StatusCode::OK, Json(marked)),
            (None, Some("K4Q9ZP")) => (StatusCode::OK, Json(marked)),
            (Some("USED-CREDENTIAL"), None) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Attendance already marked"})),
            ),
            (Some("CRASH-CREDENTIAL"), None) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "database unavailable"})),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid or expired QR code"})),
            ),
        }
    }

    async fn issue(
        headers: HeaderMap,
        Path(id): Path<u64>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer secret") {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Token is missing"})));
        }
        (
            StatusCode::OK,
            Json(json!({
                "qr_code": "data:image/png;base64,iVBORw0KGgo=",
                "jwt": format!("cred-{id}-{}", body["subject"].as_str().unwrap_or("none")),
                "expires_in": 300,
            })),
        )
    }

    async fn face(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["session_id"] != json!(4) {
            return (StatusCode::NOT_FOUND, Json(json!({"error": "Session not found"})));
        }
        (StatusCode::OK, Json(json!({"match": true, "name": "Asha"})))
    }

    async fn live(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        let status = if query.get("session_id").map(String::as_str) == Some("4") {
            "present"
        } else {
            "absent"
        };
        Json(json!({"attendance": [
            {"student_name": "Asha", "roll_no": "12", "class_name": "10-A",
             "subject": "Maths", "status": status, "marked_at": null}
        ]}))
    }

    async fn schedule() -> Json<Value> {
        Json(json!({"sessions": [
            {"id": 4, "subject": "Maths", "teacher": "Mr. Rao",
             "start_time": "2025-09-18T09:00:00", "end_time": "2025-09-18T09:45:00",
             "is_active": true, "attendance_method": "qr",
             "attendance_status": "present", "marked_at": "2025-09-18T09:05:11.123456"},
            {"id": 5, "subject": "History", "is_active": false,
             "attendance_status": null, "marked_at": null}
        ]}))
    }

    async fn stub() -> HttpBackend {
        let router = Router::new()
            .route("/api/attendance/mark-qr", post(mark))
            .route("/api/teacher/session/:id/generate_qr", post(issue))
            .route("/api/ai/recognize_face", post(face))
            .route("/api/teacher/attendance/live", get(live))
            .route("/api/attendance/sessions/today", get(schedule));
        HttpBackend::new(&serve(router).await, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_credential_and_manual_code_fields() {
        let backend = stub().await;

        let reply = backend
            .redeem_credential(&Credential::Token("GOOD-CREDENTIAL".into()))
            .await
            .unwrap();
        let record = match reply {
            RedeemReply::Marked(record) => record,
            other => panic!("expected a fresh mark, got {other:?}"),
        };
        assert_eq!(record.status, "present");
        assert!(record.marked_at.is_some());

        let reply = backend
            .redeem_credential(&Credential::ManualCode("K4Q9ZP".into()))
            .await
            .unwrap();
        assert!(matches!(reply, RedeemReply::Marked(_)));
    }

    #[tokio::test]
    async fn test_mark_reply_classes() {
        let backend = stub().await;

        let reply = backend
            .redeem_credential(&Credential::Token("USED-CREDENTIAL".into()))
            .await
            .unwrap();
        assert!(matches!(reply, RedeemReply::AlreadyMarked(_)));

        let reply = backend
            .redeem_credential(&Credential::Token("STALE-CREDENTIAL".into()))
            .await
            .unwrap();
        assert_eq!(reply, RedeemReply::Rejected("Invalid or expired QR code".into()));

        let err = backend
            .redeem_credential(&Credential::Token("CRASH-CREDENTIAL".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Server { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_issue_sends_bearer_and_subject() {
        let backend = stub().await;
        assert!(matches!(
            backend.issue_token(SessionId(4), Some("Maths")).await,
            Err(BackendError::Unauthorized)
        ));

        let backend = backend.with_auth_token("secret");
        let token = backend.issue_token(SessionId(4), Some("Maths")).await.unwrap();
        assert_eq!(token.credential, "cred-4-Maths");
        assert_eq!(token.ttl_secs, 300);
    }

    #[tokio::test]
    async fn test_face_and_roster() {
        let backend = stub().await;
        let image = FaceImage::from_data_url("data:image/jpeg;base64,AA==");

        let reply = backend.recognize_face(&image, SessionId(4)).await.unwrap();
        assert!(reply.matched);
        assert_eq!(reply.name.as_deref(), Some("Asha"));

        let reply = backend.recognize_face(&image, SessionId(5)).await.unwrap();
        assert!(!reply.matched);
        assert_eq!(reply.reason.as_deref(), Some("Session not found"));

        let roster = backend.session_roster(SessionId(4)).await.unwrap();
        assert_eq!(roster.len(), 1);
        assert!(roster[0].is_present());
    }

    #[tokio::test]
    async fn test_today_schedule_decodes() {
        let backend = stub().await;
        let schedule = backend.today_schedule().await.unwrap();

        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule[0].id, SessionId(4));
        assert_eq!(schedule[0].teacher.as_deref(), Some("Mr. Rao"));
        assert!(schedule[0].is_active);
        assert!(schedule[0].is_present());
        assert!(schedule[0].marked_at.is_some());
        assert_eq!(schedule[1].subject, "History");
        assert!(!schedule[1].is_present());
        assert_eq!(schedule[1].start_time, None);
    }

    #[tokio::test]
    async fn test_unreadable_success_body_is_decode_error() {
        let router = Router::new().route(
            "/api/attendance/mark-qr",
            post(|| async { (StatusCode::OK, "<html>login</html>") }),
        );
        let backend = HttpBackend::new(&serve(router).await, Duration::from_secs(5)).unwrap();

        let err = backend
            .redeem_credential(&Credential::ManualCode("K4Q9ZP".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));

        let client = crate::redeem::RedemptionClient::new(std::sync::Arc::new(backend));
        let result = client
            .submit(crate::redeem::RedemptionAttempt::ManualCode("K4Q9ZP".into()))
            .await;
        assert!(matches!(
            result,
            crate::redeem::RedemptionResult::TransportError { .. }
        ));
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = backend
            .redeem_credential(&Credential::ManualCode("K4Q9ZP".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Network(_)));
    }
}
