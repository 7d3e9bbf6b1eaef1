// Shared fixtures for the end-to-end attendance scenarios.
#![allow(dead_code)]

use attendance_scan::{
    backend::{InMemoryBackend, SessionId},
    capture::{CameraSessionManager, Frame, MockCamera},
    config::FileConfig,
    orchestrator::{StudentConsole, TeacherConsole},
    scan::FnDecoder,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

pub const SESSION: SessionId = SessionId(7);
pub const STUDENT: &str = "Asha";

// One session with two enrolled students, signed in as `STUDENT`.
pub fn backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_session(SESSION, "Mathematics", "Mr. Rao");
    backend.enroll(SESSION, STUDENT, "12", "10-A");
    backend.enroll(SESSION, "Ravi", "13", "10-A");
    backend.sign_in(STUDENT);
    backend
}

pub fn teacher(backend: &Arc<InMemoryBackend>) -> TeacherConsole {
    TeacherConsole::new(backend.clone(), Duration::from_secs(30))
}

// Frame the mock camera shows while the code is held up to it.
pub fn code_frame() -> Frame {
    Frame::gray(vec![255; 32 * 32], 32, 32, 0)
}

// What the decoder will read off `code_frame`. Set it once the token exists.
#[derive(Clone, Default)]
pub struct Screen(Rc<RefCell<Option<String>>>);

impl Screen {
    pub fn show(&self, payload: String) {
        *self.0.borrow_mut() = Some(payload);
    }
}

pub fn student(
    backend: &Arc<InMemoryBackend>,
    camera: MockCamera,
    screen: &Screen,
) -> StudentConsole {
    let screen = screen.clone();
    let decoder = FnDecoder(move |frame: &Frame| {
        if frame.pixels().iter().all(|&p| p == 255) {
            screen.0.borrow().clone()
        } else {
            None
        }
    });
    StudentConsole::new(
        backend.clone(),
        CameraSessionManager::new(camera),
        decoder,
        &FileConfig::default(),
    )
}
