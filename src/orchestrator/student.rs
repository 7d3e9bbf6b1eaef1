//! Student console: the attendance modal and today's schedule.

use super::ConsoleError;
use crate::backend::{AttendanceBackend, ScheduleEntry, SessionId};
use crate::capture::{CameraError, CameraSessionManager, CaptureConstraints};
use crate::config::FileConfig;
use crate::metrics::MetricsRegistry;
use crate::redeem::{FaceImage, RedemptionAttempt, RedemptionClient, RedemptionResult};
use crate::scan::{DecodeLoop, QrDecoder, ScanHandle, ScanOutcome};
use std::sync::Arc;

/// Which entry point a modal was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    QrScan,
    ManualEntry,
    FaceCapture { session_id: SessionId },
}

impl ModalKind {
    fn uses_camera(self) -> bool {
        !matches!(self, ModalKind::ManualEntry)
    }
}

/// Lifecycle of the attendance modal.
///
/// `Closed -> Opening -> Live | Failed -> Submitting -> Closed | back to
/// where it was`. A soft rejection returns to the previous state with the
/// camera still running so the student can try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Opening(ModalKind),
    Live(ModalKind),
    /// The camera could not be opened. Typing the code remains available.
    Failed { kind: ModalKind, error: CameraError },
    Submitting(ModalKind),
}

impl ModalState {
    pub fn label(&self) -> &'static str {
        match self {
            ModalState::Closed => "closed",
            ModalState::Opening(_) => "opening",
            ModalState::Live(_) => "live",
            ModalState::Failed { .. } => "failed",
            ModalState::Submitting(_) => "submitting",
        }
    }

    /// The camera error to show, with its remediation hint.
    pub fn camera_error(&self) -> Option<&CameraError> {
        match self {
            ModalState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Whether the manual code field should be offered.
    pub fn offers_manual_entry(&self) -> bool {
        match self {
            ModalState::Live(_) => true,
            ModalState::Failed { error, .. } => error.offers_manual_fallback(),
            _ => false,
        }
    }
}

/// Attendance totals over today's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleSummary {
    pub present: usize,
    pub total: usize,
}

impl ScheduleSummary {
    pub fn from_schedule(schedule: &[ScheduleEntry]) -> Self {
        Self {
            present: schedule.iter().filter(|s| s.is_present()).count(),
            total: schedule.len(),
        }
    }

    /// Rounded attendance percentage; zero for an empty day.
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.present * 100 + self.total / 2) / self.total) as u32
    }
}

/// State and commands behind the student dashboard.
///
/// Only one entry point is open at a time. Opening any of them first
/// tears down the capture device and decode loop of the previous one.
pub struct StudentConsole {
    backend: Arc<dyn AttendanceBackend>,
    client: RedemptionClient,
    camera: CameraSessionManager,
    scanner: DecodeLoop,
    scan_constraints: CaptureConstraints,
    face_constraints: CaptureConstraints,
    jpeg_quality: u8,
    state: ModalState,
    last_result: Option<RedemptionResult>,
    schedule: Vec<ScheduleEntry>,
    metrics: Option<MetricsRegistry>,
}

impl StudentConsole {
    pub fn new(
        backend: Arc<dyn AttendanceBackend>,
        camera: CameraSessionManager,
        decoder: impl QrDecoder + 'static,
        config: &FileConfig,
    ) -> Self {
        Self {
            client: RedemptionClient::new(Arc::clone(&backend)),
            backend,
            camera,
            scanner: DecodeLoop::new(decoder, config.scan.frame_interval()),
            scan_constraints: config.capture.scan.clone(),
            face_constraints: config.capture.face.clone(),
            jpeg_quality: config.face.jpeg_quality,
            state: ModalState::Closed,
            last_result: None,
            schedule: Vec::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.client = self.client.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &ModalState {
        &self.state
    }

    /// Outcome of the most recent submission, for the feedback banner.
    pub fn last_result(&self) -> Option<&RedemptionResult> {
        self.last_result.as_ref()
    }

    pub fn camera(&self) -> &CameraSessionManager {
        &self.camera
    }

    pub fn schedule(&self) -> &[ScheduleEntry] {
        &self.schedule
    }

    pub fn summary(&self) -> ScheduleSummary {
        ScheduleSummary::from_schedule(&self.schedule)
    }

    /// Handle that stops a running [`StudentConsole::scan`].
    pub fn scan_handle(&self) -> ScanHandle {
        self.scanner.handle()
    }

    /// Opens the QR scanner with the rear-facing camera.
    pub async fn open_scanner(&mut self) -> Result<(), ConsoleError> {
        self.open_camera(ModalKind::QrScan).await
    }

    /// Opens face capture for `session_id` with the front-facing camera.
    pub async fn open_face_capture(&mut self, session_id: SessionId) -> Result<(), ConsoleError> {
        self.open_camera(ModalKind::FaceCapture { session_id }).await
    }

    /// Opens the typed-code entry. No camera is used.
    pub fn open_manual_entry(&mut self) {
        self.teardown();
        self.state = ModalState::Live(ModalKind::ManualEntry);
        tracing::debug!("manual entry opened");
    }

    async fn open_camera(&mut self, kind: ModalKind) -> Result<(), ConsoleError> {
        self.teardown();
        self.state = ModalState::Opening(kind);

        let constraints = match kind {
            ModalKind::FaceCapture { .. } => &self.face_constraints,
            _ => &self.scan_constraints,
        };
        match self.camera.open(constraints).await {
            Ok(()) => {
                self.state = ModalState::Live(kind);
                Ok(())
            }
            Err(error) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_camera_error(error.kind());
                }
                self.state = ModalState::Failed {
                    kind,
                    error: error.clone(),
                };
                Err(error.into())
            }
        }
    }

    /// Samples the camera until a QR payload is found and submits it.
    ///
    /// Returns `Ok(None)` if the pass was stopped through a
    /// [`ScanHandle`] before anything was found.
    pub async fn scan(&mut self) -> Result<Option<RedemptionResult>, ConsoleError> {
        if self.state != ModalState::Live(ModalKind::QrScan) {
            return Err(self.invalid("scan"));
        }

        let before = self.scanner.frames_sampled();
        let outcome = self.scanner.run(&mut self.camera, |_| {}).await;
        if let Some(metrics) = &self.metrics {
            metrics.add_scan_frames(self.scanner.frames_sampled() - before);
        }

        match outcome {
            ScanOutcome::Found(payload) => Ok(Some(
                self.submit(RedemptionAttempt::QrPayload(payload)).await,
            )),
            ScanOutcome::Stopped => Ok(None),
        }
    }

    /// Submits a typed code.
    ///
    /// Accepted from the manual entry modal, beside a live scanner, and as
    /// the fallback of a modal whose camera failed.
    pub async fn submit_manual(&mut self, code: &str) -> Result<RedemptionResult, ConsoleError> {
        match self.state {
            ModalState::Live(_) | ModalState::Failed { .. } => {}
            _ => return Err(self.invalid("submit a code")),
        }
        Ok(self
            .submit(RedemptionAttempt::ManualCode(code.to_string()))
            .await)
    }

    /// Takes a still from the front camera and submits it for recognition.
    pub async fn capture_face(&mut self) -> Result<RedemptionResult, ConsoleError> {
        let ModalState::Live(ModalKind::FaceCapture { session_id }) = self.state else {
            return Err(self.invalid("capture a face"));
        };

        let frame = self.camera.snapshot().ok_or(ConsoleError::NoFrame)?;
        let image = FaceImage::from_frame(&frame, self.jpeg_quality)?;
        Ok(self
            .submit(RedemptionAttempt::FaceImage { image, session_id })
            .await)
    }

    async fn submit(&mut self, attempt: RedemptionAttempt) -> RedemptionResult {
        let previous = std::mem::replace(&mut self.state, ModalState::Closed);
        let kind = match &previous {
            ModalState::Live(kind) | ModalState::Failed { kind, .. } => *kind,
            _ => ModalKind::ManualEntry,
        };
        self.state = ModalState::Submitting(kind);

        let result = self.client.submit(attempt).await;
        self.last_result = Some(result.clone());

        if result.is_success() {
            self.teardown();
            self.state = ModalState::Closed;
            self.refresh_schedule_quietly().await;
        } else {
            if kind.uses_camera() && matches!(previous, ModalState::Live(_)) {
                tracing::debug!(outcome = result.label(), "keeping camera live for retry");
            }
            self.state = previous;
        }
        result
    }

    /// Reloads today's schedule.
    pub async fn refresh_schedule(&mut self) -> Result<&[ScheduleEntry], ConsoleError> {
        self.schedule = self.backend.today_schedule().await?;
        Ok(&self.schedule)
    }

    async fn refresh_schedule_quietly(&mut self) {
        if let Err(e) = self.refresh_schedule().await {
            tracing::warn!(error = %e, "schedule refresh failed, keeping last schedule");
            if let Some(metrics) = &self.metrics {
                metrics.record_refresh_failure();
            }
        }
    }

    /// Closes the modal from any state, releasing the camera.
    pub fn close(&mut self) {
        self.teardown();
        self.state = ModalState::Closed;
    }

    fn teardown(&mut self) {
        self.scanner.stop();
        self.camera.close();
    }

    fn invalid(&self, action: &'static str) -> ConsoleError {
        ConsoleError::InvalidState {
            action,
            state: self.state.label(),
        }
    }
}

impl std::fmt::Debug for StudentConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudentConsole")
            .field("state", &self.state)
            .field("camera", &self.camera)
            .field("schedule", &self.schedule.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::capture::{Frame, MockCamera};
    use crate::orchestrator::outage::Outage;
    use crate::redeem::RejectReason;
    use crate::scan::FnDecoder;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// Decoder that reads a payload from all-white frames.
    fn decoder(payload: String) -> FnDecoder<impl FnMut(&Frame) -> Option<String>> {
        FnDecoder(move |frame: &Frame| {
            frame
                .pixels()
                .iter()
                .all(|&p| p == 255)
                .then(|| payload.clone())
        })
    }

    fn code_frame() -> Frame {
        Frame::gray(vec![255; 64], 8, 8, 1)
    }

    fn backend() -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_session(SessionId(2), "Chemistry", "Mr. Das");
        backend.add_session(SessionId(3), "History", "Ms. Roy");
        backend.enroll(SessionId(2), "Asha", "12", "10-A");
        backend.enroll(SessionId(3), "Asha", "12", "10-A");
        backend.sign_in("Asha");
        backend
    }

    fn console(
        backend: Arc<InMemoryBackend>,
        camera: MockCamera,
        payload: String,
    ) -> StudentConsole {
        StudentConsole::new(
            backend,
            CameraSessionManager::new(camera),
            decoder(payload),
            &FileConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_marks_and_refreshes_schedule() {
        let backend = backend();
        let token = backend.issue(SessionId(2), Duration::from_secs(300)).unwrap();
        let camera = MockCamera::new().with_frames(vec![code_frame()]).with_warmup(2);
        let mut console = console(
            backend,
            camera.clone(),
            format!("attendance:{}:2", token.credential),
        );

        console.open_scanner().await.unwrap();
        assert_eq!(console.state(), &ModalState::Live(ModalKind::QrScan));

        let result = console.scan().await.unwrap().unwrap();
        assert!(matches!(result, RedemptionResult::Accepted { .. }));
        assert_eq!(console.state(), &ModalState::Closed);
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(
            console.summary(),
            ScheduleSummary {
                present: 1,
                total: 2
            }
        );
        assert_eq!(console.summary().percentage(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_failure_offers_manual_fallback() {
        let backend = backend();
        let token = backend.issue(SessionId(2), Duration::from_secs(300)).unwrap();
        let camera = MockCamera::failing(CameraError::PermissionDenied);
        let mut console = console(backend, camera.clone(), String::new());

        let err = console.open_scanner().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Camera(CameraError::PermissionDenied)));
        assert!(console.state().offers_manual_entry());
        assert_eq!(camera.live_streams(), 0);

        let code = token.manual_code.unwrap();
        let result = console.submit_manual(&code).await.unwrap();
        assert!(result.is_success());
        assert_eq!(console.state(), &ModalState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_rejection_keeps_modal_live() {
        let backend = backend();
        let camera = MockCamera::new();
        let mut console = console(backend, camera.clone(), String::new());

        console.open_scanner().await.unwrap();
        let result = console.submit_manual("ZZZZZZ").await.unwrap();
        assert_eq!(
            result,
            RedemptionResult::Rejected {
                reason: RejectReason::Expired
            }
        );
        assert_eq!(console.state(), &ModalState::Live(ModalKind::QrScan));
        assert_eq!(camera.live_streams(), 1);
        assert_eq!(console.last_result(), Some(&result));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_entry_points_releases_camera() {
        let camera = MockCamera::new();
        let mut console = console(backend(), camera.clone(), String::new());

        console.open_scanner().await.unwrap();
        console.open_face_capture(SessionId(2)).await.unwrap();
        assert_eq!(camera.live_streams(), 1);

        console.open_manual_entry();
        assert_eq!(camera.live_streams(), 0);
        assert!(!console.camera().is_open());
        assert_eq!(console.state(), &ModalState::Live(ModalKind::ManualEntry));

        console.close();
        console.close();
        assert_eq!(console.state(), &ModalState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_scan_returns_nothing() {
        let camera = MockCamera::new();
        let mut console = console(backend(), camera.clone(), String::new());
        console.open_scanner().await.unwrap();

        let handle = console.scan_handle();
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        };
        let (result, ()) = tokio::join!(console.scan(), stopper);
        assert_eq!(result.unwrap(), None);
        assert_eq!(console.state(), &ModalState::Live(ModalKind::QrScan));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_schedule_refresh_keeps_last_schedule() {
        let memory = backend();
        let code = memory
            .issue(SessionId(2), Duration::from_secs(300))
            .and_then(|t| t.manual_code)
            .unwrap();
        let backend = Outage::new(memory);
        let metrics = MetricsRegistry::new().unwrap();
        let mut console = StudentConsole::new(
            backend.clone(),
            CameraSessionManager::new(MockCamera::new()),
            decoder(String::new()),
            &FileConfig::default(),
        )
        .with_metrics(metrics.clone());

        console.refresh_schedule().await.unwrap();
        let before = console.schedule().to_vec();
        assert_eq!(console.summary(), ScheduleSummary { present: 0, total: 2 });

        backend.schedule.store(true, Ordering::SeqCst);
        console.open_manual_entry();
        let result = console.submit_manual(&code).await.unwrap();
        assert!(matches!(result, RedemptionResult::Accepted { .. }));
        assert_eq!(console.state(), &ModalState::Closed);
        assert_eq!(console.schedule(), before.as_slice());
        assert!(metrics
            .encode()
            .unwrap()
            .contains("attendance_refresh_failures_total 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_keeps_scanner_live() {
        let backend = Outage::new(backend());
        backend.redeem.store(true, Ordering::SeqCst);
        let camera = MockCamera::new().with_frames(vec![code_frame()]);
        let mut console = StudentConsole::new(
            backend.clone(),
            CameraSessionManager::new(camera.clone()),
            decoder("attendance:ABC123:2".into()),
            &FileConfig::default(),
        );

        console.open_scanner().await.unwrap();
        let result = console.scan().await.unwrap().unwrap();
        assert!(matches!(result, RedemptionResult::TransportError { .. }));
        assert_eq!(console.state(), &ModalState::Live(ModalKind::QrScan));
        assert_eq!(camera.live_streams(), 1);
        assert!(console.camera().is_open());

        backend.redeem.store(false, Ordering::SeqCst);
        let retry = console.submit_manual("ZZZZZZ").await.unwrap();
        assert!(matches!(retry, RedemptionResult::Rejected { .. }));
        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unencodable_still_leaves_face_capture_open() {
        let camera = MockCamera::new().with_frames(vec![Frame::rgb(vec![0; 4], 2, 2, 0)]);
        let mut console = console(backend(), camera.clone(), String::new());

        console.open_face_capture(SessionId(2)).await.unwrap();
        let err = console.capture_face().await.unwrap_err();
        assert!(matches!(err, ConsoleError::Encode(_)));
        assert_eq!(
            console.state(),
            &ModalState::Live(ModalKind::FaceCapture {
                session_id: SessionId(2)
            })
        );
        assert_eq!(camera.live_streams(), 1);
        assert!(console.last_result().is_none());
    }

    #[tokio::test]
    async fn test_commands_require_matching_modal() {
        let mut console = console(backend(), MockCamera::new(), String::new());
        assert!(matches!(
            console.scan().await,
            Err(ConsoleError::InvalidState { state: "closed", .. })
        ));
        assert!(matches!(
            console.capture_face().await,
            Err(ConsoleError::InvalidState { .. })
        ));
        assert!(matches!(
            console.submit_manual("K4Q9ZP").await,
            Err(ConsoleError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_summary_percentage_rounds() {
        let summary = ScheduleSummary {
            present: 2,
            total: 3,
        };
        assert_eq!(summary.percentage(), 67);
        assert_eq!(ScheduleSummary::default().percentage(), 0);
    }
}
