use anyhow::{bail, Context, Result};
use image::RgbImage;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;

use super::preprocess::Preprocessor;
use super::{EngineFactory, PoseEngine, RawPoseResult};
use crate::assets::ModelConfig;

/// Square input resolution of the BlazePose landmark models
const INPUT_SIZE: u32 = 256;

/// BlazePose-style pose landmark model on ONNX Runtime
///
/// Single-image mode: no tracking state survives between calls, every
/// `detect` treats its frame as an independent still.
pub struct OnnxPoseLandmarker {
    session: Session,
    preprocessor: Preprocessor,
    presence_threshold: f32,
}

impl OnnxPoseLandmarker {
    /// Create a landmarker from in-memory ONNX model bytes
    ///
    /// # Default Configuration
    /// - Input size: 256x256 NHWC
    /// - Graph optimization: Level3
    pub fn from_memory(
        model_bytes: &[u8],
        intra_threads: usize,
        presence_threshold: f32,
    ) -> Result<Self> {
        let session = session_builder(intra_threads)?
            .commit_from_memory(model_bytes)
            .context("Failed to load pose landmark model")?;

        Ok(Self {
            session,
            preprocessor: Preprocessor::new(INPUT_SIZE, INPUT_SIZE),
            presence_threshold,
        })
    }
}

fn session_builder(intra_threads: usize) -> Result<SessionBuilder> {
    let builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?;

    #[cfg(feature = "tensorrt")]
    let builder = builder.with_execution_providers([
        ort::execution_providers::TensorRTExecutionProvider::default().build(),
    ])?;

    #[cfg(feature = "cuda")]
    let builder = builder.with_execution_providers([
        ort::execution_providers::CUDAExecutionProvider::default().build(),
    ])?;

    Ok(builder)
}

impl PoseEngine for OnnxPoseLandmarker {
    fn detect(&mut self, image: &RgbImage) -> Result<RawPoseResult> {
        let _span = tracing::debug_span!("onnx_detect").entered();

        let input = Tensor::from_array(self.preprocessor.preprocess(image)?)?;

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("Failed to run inference")?;
        drop(_infer_span);

        check_output_count(outputs.len())?;

        // Output 0: landmarks [1, N*5]; output 1: pose presence [1, 1]
        let raw = LandmarkOutputs {
            landmarks: outputs[0]
                .try_extract_array::<f32>()
                .context("Failed to extract landmark tensor")?
                .iter()
                .copied()
                .collect(),
            pose_score: outputs[1]
                .try_extract_array::<f32>()
                .context("Failed to extract pose score")?
                .iter()
                .copied()
                .next(),
        };

        raw.decode(&self.preprocessor, self.presence_threshold)
    }
}

fn check_output_count(count: usize) -> Result<()> {
    if count < 2 {
        bail!(
            "pose landmark model produced {} outputs, expected landmarks and pose score",
            count
        );
    }
    Ok(())
}

/// Tensors copied out of one inference run
#[derive(Debug, Clone, PartialEq)]
struct LandmarkOutputs {
    landmarks: Vec<f32>,
    pose_score: Option<f32>,
}

impl LandmarkOutputs {
    fn decode(&self, preprocessor: &Preprocessor, presence_threshold: f32) -> Result<RawPoseResult> {
        let pose_score = self.pose_score.context("Pose score tensor is empty")?;
        preprocessor.decode_landmarks(&self.landmarks, pose_score, presence_threshold)
    }
}

/// Builds [`OnnxPoseLandmarker`] instances
#[derive(Debug, Clone, Copy)]
pub struct OnnxEngineFactory {
    intra_threads: usize,
    presence_threshold: f32,
}

impl OnnxEngineFactory {
    pub fn new(intra_threads: usize, presence_threshold: f32) -> Self {
        Self {
            intra_threads,
            presence_threshold,
        }
    }
}

impl EngineFactory for OnnxEngineFactory {
    fn create(&self, model: &ModelConfig, model_bytes: &[u8]) -> Result<Box<dyn PoseEngine>> {
        tracing::info!("Loading pose landmark model {}", model.file_name());
        let landmarker =
            OnnxPoseLandmarker::from_memory(model_bytes, self.intra_threads, self.presence_threshold)
                .with_context(|| format!("Failed to create landmarker from {}", model.file_name()))?;
        Ok(Box::new(landmarker))
    }
}
