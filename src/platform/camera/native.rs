// Native webcam capture through nokhwa

use super::{CameraBackend, VideoStream};
use crate::models::camera::{CameraError, CameraResult};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

#[derive(Debug, Default)]
pub struct NokhwaCamera;

impl NokhwaCamera {
    pub fn new() -> Self {
        Self
    }
}

struct NokhwaStream {
    camera: Camera,
}

impl VideoStream for NokhwaStream {
    fn next_frame(&mut self) -> CameraResult<image::RgbImage> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::CaptureFailed(format!("Failed to decode frame: {}", e)))?;

        // nokhwa pins its own `image` release; move the raw buffer across
        let (width, height) = (decoded.width(), decoded.height());
        image::RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| CameraError::CaptureFailed("Frame buffer size mismatch".to_string()))
    }

    fn stop(&mut self) -> CameraResult<()> {
        self.camera
            .stop_stream()
            .map_err(|e| CameraError::CaptureFailed(format!("Failed to stop stream: {}", e)))
    }
}

impl CameraBackend for NokhwaCamera {
    fn open(&self, index: u32) -> CameraResult<Box<dyn VideoStream>> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);

        let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
            tracing::debug!(index, error = %e, "camera open failed");
            CameraError::DeviceNotFound(index)
        })?;

        camera
            .open_stream()
            .map_err(|e| CameraError::PermissionDenied(e.to_string()))?;

        tracing::info!(index, name = %camera.info().human_name(), "camera stream opened");

        Ok(Box::new(NokhwaStream { camera }))
    }

    fn name(&self) -> String {
        "nokhwa native capture".to_string()
    }
}
