// Backends for the two external collaborators: the webcam and the pose model

pub mod camera;
pub mod pose;

#[cfg(test)]
pub(crate) mod fakes;
