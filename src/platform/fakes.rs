// In-process camera and pose model doubles for tests

use super::camera::{CameraBackend, VideoStream};
use super::pose::PoseModel;
use crate::models::camera::{CameraError, CameraResult, Frame};
use crate::models::pose::{
    EstimateOptions, Keypoint, PoseEstimate, PoseModelConfig, PoseResult, REQUIRED_KEYPOINTS,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct CameraCounters {
    pub opened: AtomicUsize,
    pub stopped: AtomicUsize,
    pub frames: AtomicUsize,
}

/// Camera that produces small black frames every few milliseconds
pub struct FakeCamera {
    pub counters: Arc<CameraCounters>,
    pub deny: AtomicBool,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(CameraCounters::default()),
            deny: AtomicBool::new(false),
        }
    }

    pub fn denying() -> Self {
        let camera = Self::new();
        camera.deny.store(true, Ordering::SeqCst);
        camera
    }
}

struct FakeStream {
    counters: Arc<CameraCounters>,
}

impl VideoStream for FakeStream {
    fn next_frame(&mut self) -> CameraResult<image::RgbImage> {
        std::thread::sleep(Duration::from_millis(5));
        self.counters.frames.fetch_add(1, Ordering::SeqCst);
        Ok(image::RgbImage::new(32, 24))
    }

    fn stop(&mut self) -> CameraResult<()> {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl CameraBackend for FakeCamera {
    fn open(&self, _index: u32) -> CameraResult<Box<dyn VideoStream>> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied("denied by test".to_string()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            counters: self.counters.clone(),
        }))
    }

    fn name(&self) -> String {
        "fake camera".to_string()
    }
}

/// Pose model that always answers with the configured estimate
pub struct FakePoseModel {
    pub estimate: Mutex<Option<PoseEstimate>>,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub delay: Duration,
    pub fail: AtomicBool,
}

impl FakePoseModel {
    pub fn answering(estimate: Option<PoseEstimate>) -> Self {
        Self {
            estimate: Mutex::new(estimate),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_estimate(&self, estimate: Option<PoseEstimate>) {
        *self.estimate.lock().unwrap() = estimate;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl PoseModel for FakePoseModel {
    fn load(_config: &PoseModelConfig) -> PoseResult<Self> {
        Ok(Self::answering(None))
    }

    fn estimate_single_pose(
        &self,
        _frame: &Frame,
        _options: EstimateOptions,
    ) -> PoseResult<Option<PoseEstimate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(crate::models::pose::PoseError::InferenceFailed("test".to_string()));
        }
        Ok(self.estimate.lock().unwrap().clone())
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn get_model_info(&self) -> String {
        "fake pose model".to_string()
    }
}

/// Every required part at the given score
pub fn required_pose(score: f32) -> PoseEstimate {
    PoseEstimate::from_keypoints(
        REQUIRED_KEYPOINTS
            .iter()
            .map(|part| Keypoint::new(*part, score, 10.0, 10.0))
            .collect(),
    )
}
