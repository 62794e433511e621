// Data models for camera frames, pose estimation, and session status

pub mod camera;
pub mod pose;
pub mod status;
