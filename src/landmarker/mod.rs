mod handle;
mod onnx;
mod preprocess;

pub use handle::{DetectorHandle, HandleState};
pub use onnx::{OnnxEngineFactory, OnnxPoseLandmarker};
pub use preprocess::Preprocessor;

use anyhow::Result;
use image::RgbImage;

use crate::assets::ModelConfig;
use crate::config::BridgeConfig;

/// Landmarks per detected body in the pose topology
pub const POSE_LANDMARK_COUNT: usize = 33;

/// One landmark as emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Likelihood the landmark is visible, in [0, 1]
    pub visibility: f32,
}

/// Engine output for a single image: one landmark list per detected body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPoseResult {
    pub poses: Vec<Vec<RawLandmark>>,
}

impl RawPoseResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Trait for pose-landmark inference backends.
///
/// Implementations are stateless between calls: every `detect` sees a single
/// still image. Calls must not overlap on one instance.
pub trait PoseEngine: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<RawPoseResult>;
}

/// Builds engine instances from raw model bytes
pub trait EngineFactory: Send {
    fn create(&self, model: &ModelConfig, model_bytes: &[u8]) -> Result<Box<dyn PoseEngine>>;
}

/// Create the default engine factory (ONNX Runtime)
pub fn create_default_factory(config: &BridgeConfig) -> Box<dyn EngineFactory> {
    Box::new(OnnxEngineFactory::new(
        config.intra_threads,
        config.presence_threshold,
    ))
}
