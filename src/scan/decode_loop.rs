//! Cancellable per-frame decode loop.

use super::QrDecoder;
use crate::capture::{CameraSessionManager, Frame};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Anything that can be asked for its current video frame.
pub trait FrameSource {
    /// Returns the current frame, or `None` if no picture is available yet.
    fn sample(&mut self) -> Option<Frame>;
}

impl FrameSource for CameraSessionManager {
    fn sample(&mut self) -> Option<Frame> {
        self.snapshot()
    }
}

/// How a decode pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A payload was decoded; the pass stopped sampling.
    Found(String),
    /// The pass was stopped before anything was found.
    Stopped,
}

/// Stops the current (or next) pass of a [`DecodeLoop`].
#[derive(Debug, Clone)]
pub struct ScanHandle {
    token: CancellationToken,
}

impl ScanHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Samples frames from a source until a QR payload is found or the pass is
/// stopped.
///
/// Each pass gets its own cancellation token; once a pass ends, handles
/// taken before it go stale and a later `run` starts fresh.
pub struct DecodeLoop {
    decoder: Box<dyn QrDecoder>,
    frame_interval: Duration,
    token: CancellationToken,
    frames_sampled: u64,
}

/// Shortest pause between samples.
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

impl DecodeLoop {
    /// `frame_interval` is raised to one millisecond if shorter.
    pub fn new(decoder: impl QrDecoder + 'static, frame_interval: Duration) -> Self {
        Self {
            decoder: Box::new(decoder),
            frame_interval: frame_interval.max(MIN_FRAME_INTERVAL),
            token: CancellationToken::new(),
            frames_sampled: 0,
        }
    }

    /// Handle that stops the current pass, or the next one if none is running.
    pub fn handle(&self) -> ScanHandle {
        ScanHandle {
            token: self.token.clone(),
        }
    }

    /// Stops any pass and arms a fresh token. Safe at any time.
    pub fn stop(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
    }

    /// Total frames handed to the decoder across all passes.
    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled
    }

    /// Runs one pass over `source`.
    ///
    /// `on_found` is invoked exactly once if a payload is decoded, after
    /// which no further frames are sampled. A stop request is observed
    /// before the next sample is taken.
    pub async fn run<S, F>(&mut self, source: &mut S, on_found: F) -> ScanOutcome
    where
        S: FrameSource + ?Sized,
        F: FnOnce(&str),
    {
        let token = self.token.clone();
        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break ScanOutcome::Stopped,
                _ = ticker.tick() => {}
            }

            let Some(frame) = source.sample() else {
                tracing::trace!("no frame available yet");
                continue;
            };
            self.frames_sampled += 1;

            if let Some(payload) = self.decoder.decode(&frame) {
                tracing::info!(sequence = frame.sequence(), "QR payload decoded");
                on_found(&payload);
                break ScanOutcome::Found(payload);
            }
        };

        if outcome == ScanOutcome::Stopped {
            tracing::debug!(frames = self.frames_sampled, "decode loop stopped");
        }
        self.token = CancellationToken::new();
        outcome
    }
}

impl std::fmt::Debug for DecodeLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeLoop")
            .field("frame_interval", &self.frame_interval)
            .field("frames_sampled", &self.frames_sampled)
            .finish()
    }
}
