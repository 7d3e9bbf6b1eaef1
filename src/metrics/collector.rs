//! Metrics collection and registry.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for the attendance flow.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Teacher console
    tokens_issued: IntCounter,
    tokens_expired: IntCounter,

    // Student console
    redemptions: IntCounterVec,
    camera_errors: IntCounterVec,
    scan_frames: IntCounter,

    // Both
    refresh_failures: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all attendance metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let tokens_issued = IntCounter::new(
            "attendance_tokens_issued_total",
            "Attendance tokens displayed on the teacher console",
        )?;
        let tokens_expired = IntCounter::new(
            "attendance_tokens_expired_total",
            "Displayed attendance tokens whose countdown ran out",
        )?;
        let redemptions = IntCounterVec::new(
            Opts::new(
                "attendance_redemptions_total",
                "Redemption attempts by entry point and outcome",
            ),
            &["method", "outcome"],
        )?;
        let camera_errors = IntCounterVec::new(
            Opts::new(
                "attendance_camera_errors_total",
                "Camera acquisition failures by kind",
            ),
            &["kind"],
        )?;
        let scan_frames = IntCounter::new(
            "attendance_scan_frames_total",
            "Frames handed to the QR decoder",
        )?;
        let refresh_failures = IntCounter::new(
            "attendance_refresh_failures_total",
            "Background roster or schedule refreshes that failed",
        )?;

        registry.register(Box::new(tokens_issued.clone()))?;
        registry.register(Box::new(tokens_expired.clone()))?;
        registry.register(Box::new(redemptions.clone()))?;
        registry.register(Box::new(camera_errors.clone()))?;
        registry.register(Box::new(scan_frames.clone()))?;
        registry.register(Box::new(refresh_failures.clone()))?;

        Ok(Self {
            registry,
            tokens_issued,
            tokens_expired,
            redemptions,
            camera_errors,
            scan_frames,
            refresh_failures,
        })
    }

    pub fn record_token_issued(&self) {
        self.tokens_issued.inc();
    }

    pub fn record_token_expired(&self) {
        self.tokens_expired.inc();
    }

    pub fn record_redemption(&self, method: &str, outcome: &str) {
        self.redemptions.with_label_values(&[method, outcome]).inc();
    }

    pub fn record_camera_error(&self, kind: &str) {
        self.camera_errors.with_label_values(&[kind]).inc();
    }

    pub fn add_scan_frames(&self, frames: u64) {
        self.scan_frames.inc_by(frames);
    }

    pub fn record_refresh_failure(&self) {
        self.refresh_failures.inc();
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("tokens_issued", &self.tokens_issued.get())
            .field("scan_frames", &self.scan_frames.get())
            .finish()
    }
}
