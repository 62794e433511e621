// Webcam backends
// Each backend provides the same interface; the feature set picks the default.

use crate::models::camera::CameraResult;

#[cfg(feature = "camera-native")]
pub mod native;

#[cfg(feature = "camera-native")]
pub use native::NokhwaCamera as DefaultCamera;

#[cfg(not(feature = "camera-native"))]
pub use self::UnavailableCamera as DefaultCamera;

/// A live video source. Lives on the capture thread that opened it.
pub trait VideoStream {
    /// Block until the next frame is decoded
    fn next_frame(&mut self) -> CameraResult<image::RgbImage>;

    /// Stop every underlying track and release the device
    fn stop(&mut self) -> CameraResult<()>;
}

/// Something that can hand out live video sources
pub trait CameraBackend: Send + Sync {
    fn open(&self, index: u32) -> CameraResult<Box<dyn VideoStream>>;

    fn name(&self) -> String;
}

/// Backend used when no capture feature is compiled in; every acquisition fails
#[cfg(not(feature = "camera-native"))]
#[derive(Debug, Default)]
pub struct UnavailableCamera;

#[cfg(not(feature = "camera-native"))]
impl UnavailableCamera {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(feature = "camera-native"))]
impl CameraBackend for UnavailableCamera {
    fn open(&self, _index: u32) -> CameraResult<Box<dyn VideoStream>> {
        Err(crate::models::camera::CameraError::NotSupported)
    }

    fn name(&self) -> String {
        "Unavailable camera (enable 'camera-native' feature)".to_string()
    }
}

#[cfg(all(test, not(feature = "camera-native")))]
mod tests {
    use super::*;
    use crate::models::camera::CameraError;

    #[test]
    fn test_unavailable_camera_never_opens() {
        let camera = DefaultCamera::new();
        assert!(matches!(camera.open(0), Err(CameraError::NotSupported)));
    }
}
