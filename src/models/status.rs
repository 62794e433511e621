// Session status reported to the UI layer

use super::camera::CameraState;
use super::pose::ModelState;
use serde::{Deserialize, Serialize};

/// Where the posture session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Loading,
    CameraDenied,
    ModelLoadFailed,
    Polling,
    Success,
    Prompting,
}

/// Outcome of the most recent decision, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    SittingProperly,
    NotSittingProperly,
}

impl SessionStatus {
    /// Fold model, camera and last decision into one status.
    /// Model failure dominates, then camera denial.
    pub fn derive(model: &ModelState, camera: CameraState, last: Option<Decision>) -> Self {
        match (model, camera) {
            (ModelState::Failed(_), _) => SessionStatus::ModelLoadFailed,
            (_, CameraState::Denied) => SessionStatus::CameraDenied,
            (ModelState::Loading, _) => SessionStatus::Loading,
            (ModelState::Ready, CameraState::Off) => SessionStatus::Idle,
            (ModelState::Ready, CameraState::On) => match last {
                Some(Decision::SittingProperly) => SessionStatus::Success,
                Some(Decision::NotSittingProperly) => SessionStatus::Prompting,
                None => SessionStatus::Polling,
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, SessionStatus::CameraDenied | SessionStatus::ModelLoadFailed)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Camera is off.",
            SessionStatus::Loading => "Loading pose model...",
            SessionStatus::CameraDenied => "Camera could not be opened.",
            SessionStatus::ModelLoadFailed => "Pose model failed to load.",
            SessionStatus::Polling => "Checking posture...",
            SessionStatus::Success => "Sitting properly.",
            SessionStatus::Prompting => "Not sitting properly yet.",
        }
    }
}
