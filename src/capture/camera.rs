//! Camera abstraction for video capture.
//!
//! This module provides a trait-based abstraction over capture devices,
//! allowing for both real camera input and mock implementations for testing.

use super::{CameraError, CaptureConstraints, Frame};
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A platform that can hand out live video streams.
///
/// Acquisition is asynchronous because the platform may prompt the user
/// for permission before a device is granted.
#[async_trait(?Send)]
pub trait CameraBackend {
    /// Requests a video-only capture device matching `constraints`.
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// A live video stream handed out by a [`CameraBackend`].
pub trait VideoStream {
    /// Human-readable device label.
    fn label(&self) -> &str;

    /// Returns the current frame, or `None` if the stream has no picture yet.
    fn sample(&mut self) -> Option<Frame>;

    /// Stops every track of the stream, releasing the device.
    fn stop(&mut self);

    /// Checks if any track is still running.
    fn is_live(&self) -> bool;
}

#[derive(Debug, Default)]
struct MockState {
    failure: Option<CameraError>,
    script: Vec<Frame>,
    warmup_samples: u32,
    live_streams: usize,
    acquisitions: usize,
}

/// Mock camera for testing.
///
/// Each acquired stream replays the scripted frames in order and then
/// keeps returning the last one, like a camera pointed at a still scene.
/// Without a script it produces synthetic frames. Clones share state so a
/// test can keep a handle and inspect how many streams are still live.
#[derive(Debug, Clone, Default)]
pub struct MockCamera {
    state: Rc<RefCell<MockState>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every acquisition fail with `error`.
    pub fn failing(error: CameraError) -> Self {
        let camera = Self::new();
        camera.state.borrow_mut().failure = Some(error);
        camera
    }

    /// Sets the frames replayed by each new stream.
    pub fn with_frames(self, frames: Vec<Frame>) -> Self {
        self.state.borrow_mut().script = frames;
        self
    }

    /// Number of initial samples that return no picture.
    pub fn with_warmup(self, samples: u32) -> Self {
        self.state.borrow_mut().warmup_samples = samples;
        self
    }

    /// Streams acquired and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.state.borrow().live_streams
    }

    /// Total successful acquisitions.
    pub fn acquisitions(&self) -> usize {
        self.state.borrow().acquisitions
    }
}

#[async_trait(?Send)]
impl CameraBackend for MockCamera {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        constraints
            .validate()
            .map_err(|e| CameraError::Unknown(e.to_string()))?;

        let mut state = self.state.borrow_mut();
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        state.live_streams += 1;
        state.acquisitions += 1;

        let stream = MockStream {
            label: format!("mock camera {:?} #{}", constraints.facing, state.acquisitions),
            width: constraints.width,
            height: constraints.height,
            frames: state.script.iter().cloned().collect(),
            last: None,
            warmup: state.warmup_samples,
            sequence: 0,
            live: true,
            shared: Rc::clone(&self.state),
        };
        tracing::info!(label = %stream.label, "MockCamera stream acquired");
        Ok(Box::new(stream))
    }
}

struct MockStream {
    label: String,
    width: u32,
    height: u32,
    frames: VecDeque<Frame>,
    last: Option<Frame>,
    warmup: u32,
    sequence: u64,
    live: bool,
    shared: Rc<RefCell<MockState>>,
}

impl MockStream {
    fn synthetic(&self) -> Frame {
        let pixel_count = (self.width * self.height) as usize;
        let pixels: Vec<u8> = (0..pixel_count)
            .map(|i| ((i as u64 ^ self.sequence) % 256) as u8)
            .collect();
        Frame::gray(pixels, self.width, self.height, self.sequence)
    }
}

impl VideoStream for MockStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn sample(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }
        if self.warmup > 0 {
            self.warmup -= 1;
            return None;
        }

        self.sequence += 1;
        if let Some(next) = self.frames.pop_front() {
            self.last = Some(next);
        }
        let frame = match &self.last {
            Some(f) => Frame::new(
                f.pixels().to_vec(),
                f.width(),
                f.height(),
                f.format(),
                self.sequence,
            ),
            None => self.synthetic(),
        };
        Some(frame)
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.shared.borrow_mut().live_streams -= 1;
            tracing::info!(label = %self.label, "MockCamera stream stopped");
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_camera_lifecycle() {
        let camera = MockCamera::new();
        let mut stream = camera
            .acquire(&CaptureConstraints::scanning())
            .await
            .unwrap();
        assert_eq!(camera.live_streams(), 1);
        assert!(stream.is_live());

        let frame = stream.sample().unwrap();
        assert!(frame.is_valid());
        assert_eq!(frame.sequence(), 1);
        assert_eq!(stream.sample().unwrap().sequence(), 2);

        stream.stop();
        stream.stop();
        assert!(!stream.is_live());
        assert_eq!(camera.live_streams(), 0);
        assert!(stream.sample().is_none());
    }

    #[tokio::test]
    async fn test_failing_camera_acquires_nothing() {
        let camera = MockCamera::failing(CameraError::PermissionDenied);
        let result = camera.acquire(&CaptureConstraints::scanning()).await;
        assert!(matches!(result, Err(CameraError::PermissionDenied)));
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(camera.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_script_then_still_scene() {
        let a = Frame::gray(vec![1; 4], 2, 2, 0);
        let b = Frame::gray(vec![2; 4], 2, 2, 0);
        let camera = MockCamera::new().with_frames(vec![a, b]).with_warmup(1);
        let mut stream = camera
            .acquire(&CaptureConstraints::scanning())
            .await
            .unwrap();

        assert!(stream.sample().is_none());
        assert_eq!(stream.sample().unwrap().pixels(), &[1; 4]);
        assert_eq!(stream.sample().unwrap().pixels(), &[2; 4]);
        assert_eq!(stream.sample().unwrap().pixels(), &[2; 4]);
    }
}
