// Data models for single-person pose estimation

use serde::{Deserialize, Serialize};
use std::fmt;

// ==============================================================================
// Keypoints (17 PoseNet / MoveNet parts)
// ==============================================================================

/// Named anatomical landmark, in the order the model emits them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeypointName {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointName {
    /// All parts in model output order
    pub const ALL: [KeypointName; 17] = [
        KeypointName::Nose,
        KeypointName::LeftEye,
        KeypointName::RightEye,
        KeypointName::LeftEar,
        KeypointName::RightEar,
        KeypointName::LeftShoulder,
        KeypointName::RightShoulder,
        KeypointName::LeftElbow,
        KeypointName::RightElbow,
        KeypointName::LeftWrist,
        KeypointName::RightWrist,
        KeypointName::LeftHip,
        KeypointName::RightHip,
        KeypointName::LeftKnee,
        KeypointName::RightKnee,
        KeypointName::LeftAnkle,
        KeypointName::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeypointName::Nose => "nose",
            KeypointName::LeftEye => "leftEye",
            KeypointName::RightEye => "rightEye",
            KeypointName::LeftEar => "leftEar",
            KeypointName::RightEar => "rightEar",
            KeypointName::LeftShoulder => "leftShoulder",
            KeypointName::RightShoulder => "rightShoulder",
            KeypointName::LeftElbow => "leftElbow",
            KeypointName::RightElbow => "rightElbow",
            KeypointName::LeftWrist => "leftWrist",
            KeypointName::RightWrist => "rightWrist",
            KeypointName::LeftHip => "leftHip",
            KeypointName::RightHip => "rightHip",
            KeypointName::LeftKnee => "leftKnee",
            KeypointName::RightKnee => "rightKnee",
            KeypointName::LeftAnkle => "leftAnkle",
            KeypointName::RightAnkle => "rightAnkle",
        }
    }
}

impl fmt::Display for KeypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts that must all be confidently detected for "sitting properly"
pub const REQUIRED_KEYPOINTS: [KeypointName; 5] = [
    KeypointName::Nose,
    KeypointName::LeftEye,
    KeypointName::RightEye,
    KeypointName::LeftShoulder,
    KeypointName::RightShoulder,
];

/// Minimum score for a keypoint to count as detected
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Image-space position in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: KeypointName,
    pub score: f32, // 0.0 - 1.0
    pub position: Position,
}

impl Keypoint {
    pub fn new(part: KeypointName, score: f32, x: f32, y: f32) -> Self {
        Self {
            part,
            score,
            position: Position { x, y },
        }
    }

    pub fn is_confident(&self, min_confidence: f32) -> bool {
        self.score >= min_confidence
    }
}

// ==============================================================================
// Pose Estimate (one frame)
// ==============================================================================

/// Every keypoint the model reported for one video frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub score: f32,
    pub keypoints: Vec<Keypoint>,
}

impl PoseEstimate {
    /// Build an estimate whose overall score is the mean keypoint score
    pub fn from_keypoints(keypoints: Vec<Keypoint>) -> Self {
        let score = if keypoints.is_empty() {
            0.0
        } else {
            keypoints.iter().map(|k| k.score).sum::<f32>() / keypoints.len() as f32
        };
        Self { score, keypoints }
    }

    pub fn get(&self, part: KeypointName) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.part == part)
    }
}

/// Per-call estimation options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EstimateOptions {
    pub flip_horizontal: bool,
}

// ==============================================================================
// Configuration
// ==============================================================================

/// Settings handed to a pose model backend when it is loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseModelConfig {
    pub model_path: std::path::PathBuf,
    pub input_size: u32, // Square model input edge in pixels (MoveNet Lightning: 192)
}

impl Default for PoseModelConfig {
    fn default() -> Self {
        Self {
            model_path: std::path::PathBuf::from("models/movenet-singlepose-lightning.onnx"),
            input_size: 192,
        }
    }
}

// ==============================================================================
// Model readiness
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ModelState {
    Loading,
    Ready,
    Failed(String),
}

impl ModelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready)
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose model not initialized")]
    NotInitialized,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not supported in this build")]
    NotSupported,
}

pub type PoseResult<T> = Result<T, PoseError>;
