//! Native capture devices through `nokhwa`.

use super::{CameraBackend, CameraError, CaptureConstraints, Frame, VideoStream};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Camera, NokhwaError};

/// Camera backend for locally attached devices.
#[derive(Debug, Clone, Default)]
pub struct NativeCamera {
    device_index: u32,
}

impl NativeCamera {
    pub fn new(device_index: u32) -> Self {
        Self { device_index }
    }
}

fn classify(error: NokhwaError) -> CameraError {
    match error {
        NokhwaError::UnsupportedOperationError(_) => CameraError::Unsupported,
        other => CameraError::from_message(&other.to_string()),
    }
}

#[async_trait(?Send)]
impl CameraBackend for NativeCamera {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        let format = CameraFormat::new(
            Resolution::new(constraints.width, constraints.height),
            FrameFormat::MJPEG,
            constraints.frame_rate,
        );
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera =
            Camera::new(CameraIndex::Index(self.device_index), requested).map_err(classify)?;
        camera.open_stream().map_err(classify)?;

        let label = camera.info().human_name();
        Ok(Box::new(NativeStream {
            camera,
            label,
            sequence: 0,
            live: true,
        }))
    }
}

struct NativeStream {
    camera: Camera,
    label: String,
    sequence: u64,
    live: bool,
}

impl VideoStream for NativeStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn sample(&mut self) -> Option<Frame> {
        if !self.live {
            return None;
        }
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::trace!(error = %e, "no frame available");
                return None;
            }
        };
        let image = buffer.decode_image::<RgbFormat>().ok()?;
        self.sequence += 1;
        let (width, height) = (image.width(), image.height());
        Some(Frame::rgb(image.into_raw(), width, height, self.sequence))
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!(error = %e, "failed to stop camera stream");
            }
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
