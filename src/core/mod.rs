pub mod config;
pub mod ml_models;
pub mod validation;

// Camera, model and the loop that ties them together
pub mod camera_controller;
pub mod model_loader;
pub mod validation_loop;

// Where results end up
pub mod surface;
