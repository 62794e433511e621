// Data structures for webcam capture

use serde::{Deserialize, Serialize};

/// A decoded frame from the active camera
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: i64,
    pub sequence: u64, // Restarts at 0 for every acquired source
    pub image: image::RgbImage,
}

impl Frame {
    pub fn new(sequence: u64, image: image::RgbImage) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            sequence,
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Camera on/off state as seen by the rest of the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    Off,
    On,
    /// Last acquisition attempt failed (permission denied or no device)
    Denied,
}

impl CameraState {
    pub fn is_on(&self) -> bool {
        matches!(self, CameraState::On)
    }

    /// Text for the single user-facing toggle control
    pub fn toggle_label(&self) -> &'static str {
        match self {
            CameraState::On => "Turn Off Camera",
            CameraState::Off | CameraState::Denied => "Turn On Camera",
        }
    }
}

/// Error types for camera operations
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera not found: {0}")]
    DeviceNotFound(u32),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Not supported in this build")]
    NotSupported,
}

pub type CameraResult<T> = Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_label_reflects_state() {
        assert_eq!(CameraState::Off.toggle_label(), "Turn On Camera");
        assert_eq!(CameraState::Denied.toggle_label(), "Turn On Camera");
        assert_eq!(CameraState::On.toggle_label(), "Turn Off Camera");
        assert!(CameraState::On.is_on());
        assert!(!CameraState::Denied.is_on());
    }

    #[test]
    fn test_frame_dimensions() {
        let frame = Frame::new(3, image::RgbImage::new(64, 48));
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.sequence, 3);
        assert!(frame.timestamp > 0);
    }
}
