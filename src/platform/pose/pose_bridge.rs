// Pose model bridge
// Abstraction over the single-person pose estimator; the rest of the app only
// sees named, scored keypoints.

use crate::models::camera::Frame;
use crate::models::pose::{
    EstimateOptions, Keypoint, KeypointName, PoseError, PoseEstimate, PoseModelConfig, PoseResult,
};

/// Implement this for each inference backend
pub trait PoseModel: Send + Sync {
    /// Load the model
    fn load(config: &PoseModelConfig) -> PoseResult<Self>
    where
        Self: Sized;

    /// Whether `load` reads `model_path`; when false the loader skips resolving it
    fn requires_model_file() -> bool
    where
        Self: Sized,
    {
        true
    }

    /// Estimate one pose for the frame; `None` when the model saw nobody
    fn estimate_single_pose(
        &self,
        frame: &Frame,
        options: EstimateOptions,
    ) -> PoseResult<Option<PoseEstimate>>;

    /// Check if the model can actually produce estimates
    fn is_initialized(&self) -> bool;

    fn get_model_info(&self) -> String;
}

/// Decode a MoveNet SinglePose output tensor (`[1, 1, 17, 3]`, rows of
/// normalized `y, x, score`) into pixel-space keypoints.
pub fn decode_movenet_output(
    data: &[f32],
    width: u32,
    height: u32,
    flip_horizontal: bool,
) -> PoseResult<PoseEstimate> {
    let expected = KeypointName::ALL.len() * 3;
    if data.len() < expected {
        return Err(PoseError::InferenceFailed(format!(
            "Unexpected output size: {} values, need {}",
            data.len(),
            expected
        )));
    }

    let keypoints = KeypointName::ALL
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let y = data[i * 3].clamp(0.0, 1.0);
            let mut x = data[i * 3 + 1].clamp(0.0, 1.0);
            if flip_horizontal {
                x = 1.0 - x;
            }
            let score = data[i * 3 + 2].clamp(0.0, 1.0);
            Keypoint::new(*part, score, x * width as f32, y * height as f32)
        })
        .collect();

    Ok(PoseEstimate::from_keypoints(keypoints))
}

// ==============================================================================
// ONNX Runtime Implementation (MoveNet)
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub mod onnx_backend {
    use super::*;
    use image::imageops::FilterType;
    use ndarray::Array4;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Value;
    use std::sync::Mutex;

    pub struct OnnxPoseModel {
        session: Mutex<Session>,
        output_name: String,
        config: PoseModelConfig,
    }

    impl PoseModel for OnnxPoseModel {
        fn load(config: &PoseModelConfig) -> PoseResult<Self> {
            if !config.model_path.exists() {
                return Err(PoseError::ModelLoadFailed(format!(
                    "Model not found: {}",
                    config.model_path.display()
                )));
            }

            let session = Session::builder()
                .map_err(|e| PoseError::ModelLoadFailed(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| PoseError::ModelLoadFailed(format!("Failed to set optimization: {}", e)))?
                .commit_from_file(&config.model_path)
                .map_err(|e| PoseError::ModelLoadFailed(format!("Failed to load model: {}", e)))?;

            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .ok_or_else(|| PoseError::ModelLoadFailed("No output defined".to_string()))?;

            tracing::info!(path = %config.model_path.display(), "ONNX pose model loaded");

            Ok(Self {
                session: Mutex::new(session),
                output_name,
                config: config.clone(),
            })
        }

        fn estimate_single_pose(
            &self,
            frame: &Frame,
            options: EstimateOptions,
        ) -> PoseResult<Option<PoseEstimate>> {
            let size = self.config.input_size;
            let resized = image::imageops::resize(&frame.image, size, size, FilterType::Triangle);

            let input = Array4::<i32>::from_shape_fn(
                (1, size as usize, size as usize, 3),
                |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as i32,
            );
            let input_tensor = Value::from_array(input)
                .map_err(|e| PoseError::InferenceFailed(format!("Tensor error: {}", e)))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| PoseError::InferenceFailed("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![input_tensor])
                .map_err(|e| PoseError::InferenceFailed(format!("Inference failed: {}", e)))?;

            let output = outputs
                .get(&self.output_name)
                .ok_or_else(|| PoseError::InferenceFailed("No output".to_string()))?;

            let (_, data) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| PoseError::InferenceFailed(format!("Extract error: {}", e)))?;

            let estimate = decode_movenet_output(
                data,
                frame.width(),
                frame.height(),
                options.flip_horizontal,
            )?;
            Ok(Some(estimate))
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn get_model_info(&self) -> String {
            format!(
                "ONNX Runtime MoveNet ({}, {}px input)",
                self.config.model_path.display(),
                self.config.input_size
            )
        }
    }
}

// ==============================================================================
// Dummy Implementation (for compilation without features)
// ==============================================================================

#[cfg(not(feature = "ml-onnx"))]
pub struct DummyPoseModel {
    config: PoseModelConfig,
}

#[cfg(not(feature = "ml-onnx"))]
impl PoseModel for DummyPoseModel {
    fn load(config: &PoseModelConfig) -> PoseResult<Self> {
        tracing::warn!("Using dummy pose model (no inference); enable the 'ml-onnx' feature for real estimates");
        Ok(Self {
            config: config.clone(),
        })
    }

    fn requires_model_file() -> bool {
        false
    }

    fn estimate_single_pose(
        &self,
        _frame: &Frame,
        _options: EstimateOptions,
    ) -> PoseResult<Option<PoseEstimate>> {
        Ok(None)
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn get_model_info(&self) -> String {
        format!(
            "Dummy pose model (no ML inference, ignoring {}) - enable 'ml-onnx' feature",
            self.config.model_path.display()
        )
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub type DefaultPoseModel = onnx_backend::OnnxPoseModel;

#[cfg(not(feature = "ml-onnx"))]
pub type DefaultPoseModel = DummyPoseModel;

#[cfg(test)]
mod tests {
    use super::*;

    fn movenet_rows(score: f32) -> Vec<f32> {
        KeypointName::ALL
            .iter()
            .flat_map(|_| [0.25, 0.5, score])
            .collect()
    }

    #[test]
    fn test_decode_maps_to_pixel_space() {
        let estimate = decode_movenet_output(&movenet_rows(0.8), 640, 480, false).unwrap();
        assert_eq!(estimate.keypoints.len(), 17);

        let nose = estimate.get(KeypointName::Nose).unwrap();
        assert_eq!(nose.position.x, 320.0);
        assert_eq!(nose.position.y, 120.0);
        assert!((nose.score - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_flip_mirrors_x() {
        let mut rows = movenet_rows(0.9);
        rows[1] = 0.1; // nose x
        let estimate = decode_movenet_output(&rows, 100, 100, true).unwrap();
        let nose = estimate.get(KeypointName::Nose).unwrap();
        assert!((nose.position.x - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_decode_rejects_short_output() {
        let result = decode_movenet_output(&[0.0; 10], 100, 100, false);
        assert!(matches!(result, Err(PoseError::InferenceFailed(_))));
    }

    #[cfg(not(feature = "ml-onnx"))]
    #[test]
    fn test_dummy_model_never_estimates() {
        let model = DummyPoseModel::load(&PoseModelConfig::default()).unwrap();
        let frame = Frame::new(0, image::RgbImage::new(8, 8));
        assert!(!model.is_initialized());
        assert!(!DummyPoseModel::requires_model_file());
        assert!(model
            .estimate_single_pose(&frame, EstimateOptions::default())
            .unwrap()
            .is_none());
    }
}
