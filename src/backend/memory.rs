//! In-process stand-in for the attendance backend.
//!
//! Mirrors the server rules the dashboards rely on: tokens expire after
//! their TTL, a student is marked at most once per session (a repeat is
//! reported as already marked and keeps the first mark time), and face
//! stills only match images registered beforehand. Expiry follows the
//! tokio clock, so tests with paused time can move past a TTL.

use super::{
    AttendanceBackend, BackendError, FaceMatchReply, IssuedToken, MarkRecord, RedeemReply,
    RosterEntry, ScheduleEntry, SessionId,
};
use crate::redeem::{Credential, FaceImage, ATTENDANCE_PREFIX};
use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use rand_core::{OsRng, RngCore};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);
const CREDENTIAL_LEN: usize = 32;
const CREDENTIAL_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const MANUAL_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_code(len: usize, alphabet: &[u8]) -> String {
    (0..len)
        .map(|_| alphabet[OsRng.next_u32() as usize % alphabet.len()] as char)
        .collect()
}

#[derive(Debug, Clone)]
struct Student {
    name: String,
    roll_no: String,
    class_name: String,
}

#[derive(Debug)]
struct Session {
    subject: String,
    teacher: String,
    students: Vec<Student>,
}

#[derive(Debug)]
struct Issued {
    session_id: SessionId,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<SessionId, Session>,
    tokens: HashMap<String, Issued>,
    manual_codes: HashMap<String, String>,
    marks: HashMap<(SessionId, String), MarkRecord>,
    faces: HashMap<String, String>,
    signed_in: Option<String>,
}

impl State {
    fn is_enrolled(&self, session_id: SessionId, student: &str) -> bool {
        self.sessions
            .get(&session_id)
            .is_some_and(|s| s.students.iter().any(|st| st.name == student))
    }

    /// Records a mark unless one exists. Returns the stored record and
    /// whether it was created by this call.
    fn mark(&mut self, session_id: SessionId, student: &str, method: &str) -> (MarkRecord, bool) {
        let key = (session_id, student.to_string());
        if let Some(existing) = self.marks.get(&key) {
            return (existing.clone(), false);
        }
        let record = MarkRecord {
            name: Some(student.to_string()),
            status: "present".to_string(),
            marked_at: Some(Utc::now().naive_utc()),
        };
        tracing::debug!(session = %session_id, student, method, "attendance recorded");
        self.marks.insert(key, record.clone());
        (record, true)
    }
}

/// Attendance backend held entirely in memory.
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    token_ttl: Duration,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Lifetime of tokens issued through [`AttendanceBackend::issue_token`].
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a class session to today's timetable.
    pub fn add_session(&self, session_id: SessionId, subject: &str, teacher: &str) {
        self.state().sessions.insert(
            session_id,
            Session {
                subject: subject.to_string(),
                teacher: teacher.to_string(),
                students: Vec::new(),
            },
        );
    }

    /// Enrolls a student in a session. Unknown sessions are ignored.
    pub fn enroll(&self, session_id: SessionId, name: &str, roll_no: &str, class_name: &str) {
        if let Some(session) = self.state().sessions.get_mut(&session_id) {
            session.students.push(Student {
                name: name.to_string(),
                roll_no: roll_no.to_string(),
                class_name: class_name.to_string(),
            });
        }
    }

    /// Sets the student the credential and schedule calls act for.
    pub fn sign_in(&self, student: &str) {
        self.state().signed_in = Some(student.to_string());
    }

    /// Registers the face still that identifies `student`.
    pub fn register_face(&self, student: &str, image: &FaceImage) {
        self.state()
            .faces
            .insert(image.data_url().to_string(), student.to_string());
    }

    /// The stored mark for a student, if any.
    pub fn mark_of(&self, session_id: SessionId, student: &str) -> Option<MarkRecord> {
        self.state()
            .marks
            .get(&(session_id, student.to_string()))
            .cloned()
    }

    /// Issues a token directly, bypassing the teacher console.
    pub fn issue(&self, session_id: SessionId, ttl: Duration) -> Option<IssuedToken> {
        let mut state = self.state();
        if !state.sessions.contains_key(&session_id) {
            return None;
        }

        let credential = random_code(CREDENTIAL_LEN, CREDENTIAL_ALPHABET);
        let manual_code = random_code(6, MANUAL_CODE_ALPHABET);
        state.tokens.insert(
            credential.clone(),
            Issued {
                session_id,
                expires_at: Instant::now() + ttl,
            },
        );
        state
            .manual_codes
            .insert(manual_code.clone(), credential.clone());

        // Stands in for the rendered PNG: the image carries the QR payload text.
        let payload = format!("{ATTENDANCE_PREFIX}{credential}:{session_id}");
        let image = format!(
            "data:text/plain;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(payload)
        );

        Some(IssuedToken {
            image,
            credential,
            ttl_secs: ttl.as_secs(),
            manual_code: Some(manual_code),
        })
    }
}

#[async_trait]
impl AttendanceBackend for InMemoryBackend {
    async fn issue_token(
        &self,
        session_id: SessionId,
        subject: Option<&str>,
    ) -> Result<IssuedToken, BackendError> {
        tracing::debug!(session = %session_id, subject, "issuing in-memory token");
        self.issue(session_id, self.token_ttl)
            .ok_or_else(|| BackendError::Rejected("Session not found or access denied".into()))
    }

    async fn redeem_credential(
        &self,
        credential: &Credential,
    ) -> Result<RedeemReply, BackendError> {
        let mut state = self.state();
        let student = state.signed_in.clone().ok_or(BackendError::Unauthorized)?;

        let token = match credential {
            Credential::Token(token) => Some(token.clone()),
            Credential::ManualCode(code) => state.manual_codes.get(code).cloned(),
        };
        let session_id = match token.as_ref().and_then(|t| state.tokens.get(t)) {
            Some(issued) if Instant::now() < issued.expires_at => issued.session_id,
            _ => return Ok(RedeemReply::Rejected("Invalid or expired QR code".into())),
        };

        if !state.is_enrolled(session_id, &student) {
            return Ok(RedeemReply::Rejected(
                "Student is not enrolled in this session".into(),
            ));
        }

        let (record, created) = state.mark(session_id, &student, "qr");
        Ok(if created {
            RedeemReply::Marked(record)
        } else {
            RedeemReply::AlreadyMarked(record)
        })
    }

    async fn recognize_face(
        &self,
        image: &FaceImage,
        session_id: SessionId,
    ) -> Result<FaceMatchReply, BackendError> {
        let mut state = self.state();
        let Some(student) = state.faces.get(image.data_url()).cloned() else {
            return Ok(FaceMatchReply {
                reason: Some("Unknown face".into()),
                ..Default::default()
            });
        };
        if !state.is_enrolled(session_id, &student) {
            return Ok(FaceMatchReply {
                reason: Some("Student is not enrolled in this session".into()),
                ..Default::default()
            });
        }

        let (record, created) = state.mark(session_id, &student, "face");
        Ok(FaceMatchReply {
            matched: true,
            already_marked: !created,
            newly_marked: Some(created),
            name: Some(student),
            marked_at: record.marked_at,
            reason: None,
        })
    }

    async fn session_roster(&self, session_id: SessionId) -> Result<Vec<RosterEntry>, BackendError> {
        let state = self.state();
        let session = state
            .sessions
            .get(&session_id)
            .ok_or_else(|| BackendError::Rejected("Session not found or access denied".into()))?;

        Ok(session
            .students
            .iter()
            .map(|student| {
                let mark = state.marks.get(&(session_id, student.name.clone()));
                RosterEntry {
                    student_name: student.name.clone(),
                    roll_no: Some(student.roll_no.clone()),
                    class_name: Some(student.class_name.clone()),
                    subject: Some(session.subject.clone()),
                    status: Some(
                        mark.map_or_else(|| "absent".to_string(), |m| m.status.clone()),
                    ),
                    marked_at: mark.and_then(|m| m.marked_at),
                }
            })
            .collect())
    }

    async fn today_schedule(&self) -> Result<Vec<ScheduleEntry>, BackendError> {
        let state = self.state();
        let student = state.signed_in.clone().ok_or(BackendError::Unauthorized)?;

        let mut schedule: Vec<ScheduleEntry> = state
            .sessions
            .iter()
            .filter(|(_, session)| session.students.iter().any(|s| s.name == student))
            .map(|(id, session)| {
                let mark = state.marks.get(&(*id, student.clone()));
                ScheduleEntry {
                    id: *id,
                    subject: session.subject.clone(),
                    teacher: Some(session.teacher.clone()),
                    start_time: None,
                    end_time: None,
                    is_active: true,
                    attendance_method: Some("qr".to_string()),
                    attendance_status: Some(
                        mark.map_or_else(|| "absent".to_string(), |m| m.status.clone()),
                    ),
                    marked_at: mark.and_then(|m| m.marked_at),
                }
            })
            .collect();
        schedule.sort_by_key(|entry| entry.id);
        Ok(schedule)
    }
}
