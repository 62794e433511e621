// Pose estimation platform integration
// Provides the model bridge and its backends

pub mod pose_bridge;

pub use pose_bridge::{decode_movenet_output, DefaultPoseModel, PoseModel};
