//! Ownership of the one live capture device per modal.

use super::{CameraBackend, CameraError, CaptureConstraints, Frame, VideoStream};

/// Surface that shows the live camera picture to the user.
pub trait PreviewSurface {
    /// Binds the stream to the surface and begins playback.
    fn attach(&mut self, stream_label: &str) -> Result<(), CameraError>;

    /// Stops playback and clears the bound stream.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

/// Preview surface for environments without a display.
#[derive(Debug, Default)]
pub struct HeadlessPreview {
    source: Option<String>,
}

impl HeadlessPreview {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label of the attached stream.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl PreviewSurface for HeadlessPreview {
    fn attach(&mut self, stream_label: &str) -> Result<(), CameraError> {
        self.source = Some(stream_label.to_string());
        Ok(())
    }

    fn detach(&mut self) {
        self.source = None;
    }

    fn is_attached(&self) -> bool {
        self.source.is_some()
    }
}

/// An acquired stream that is bound to the preview.
struct CaptureSession {
    stream: Box<dyn VideoStream>,
}

/// Acquires and releases the capture device for one modal.
///
/// Holds at most one stream. Opening again closes the previous stream
/// first, and dropping the manager closes whatever is still open, so the
/// device is released on every exit path.
pub struct CameraSessionManager {
    backend: Box<dyn CameraBackend>,
    preview: Box<dyn PreviewSurface>,
    session: Option<CaptureSession>,
}

impl CameraSessionManager {
    /// Creates a manager with a headless preview.
    pub fn new(backend: impl CameraBackend + 'static) -> Self {
        Self::with_preview(backend, HeadlessPreview::new())
    }

    pub fn with_preview(
        backend: impl CameraBackend + 'static,
        preview: impl PreviewSurface + 'static,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            preview: Box::new(preview),
            session: None,
        }
    }

    /// Requests a device and binds it to the preview.
    ///
    /// On failure no stream is retained.
    pub async fn open(&mut self, constraints: &CaptureConstraints) -> Result<(), CameraError> {
        self.close();

        let mut stream = match self.backend.acquire(constraints).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "camera acquisition failed");
                return Err(e);
            }
        };

        if let Err(e) = self.preview.attach(stream.label()) {
            stream.stop();
            tracing::warn!(kind = e.kind(), error = %e, "preview playback failed");
            return Err(e);
        }

        tracing::info!(label = stream.label(), facing = ?constraints.facing, "camera opened");
        self.session = Some(CaptureSession { stream });
        Ok(())
    }

    /// Stops every track and detaches the preview. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stream.stop();
            self.preview.detach();
            tracing::info!(label = session.stream.label(), "camera closed");
        }
    }

    /// Checks if a stream is currently held.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Checks if the preview is showing a stream.
    pub fn is_previewing(&self) -> bool {
        self.preview.is_attached()
    }

    /// Label of the held stream.
    pub fn stream_label(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.stream.label())
    }

    /// Samples the current frame of the held stream.
    pub fn snapshot(&mut self) -> Option<Frame> {
        self.session.as_mut()?.stream.sample()
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CameraSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSessionManager")
            .field("stream", &self.stream_label())
            .field("previewing", &self.is_previewing())
            .finish()
    }
}
