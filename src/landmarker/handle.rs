use image::RgbImage;

use super::{EngineFactory, PoseEngine, RawPoseResult};
use crate::assets::{AssetSource, ModelConfig};
use crate::error::{PoseError, PoseResult};

/// Lifecycle of a [`DetectorHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Ready,
    Released,
}

enum Slot {
    Uninitialized,
    Ready {
        model: ModelConfig,
        engine: Box<dyn PoseEngine>,
    },
    Released,
}

/// Owns exactly one inference-engine instance.
///
/// `Uninitialized -> Ready -> Released`. A ready handle is bound to one model
/// for its whole life; loading another model means building another handle.
/// Not safe for overlapping `detect` calls: `&mut self` makes the owner
/// serialize them.
pub struct DetectorHandle {
    slot: Slot,
}

impl DetectorHandle {
    pub fn new() -> Self {
        Self {
            slot: Slot::Uninitialized,
        }
    }

    pub fn state(&self) -> HandleState {
        match self.slot {
            Slot::Uninitialized => HandleState::Uninitialized,
            Slot::Ready { .. } => HandleState::Ready,
            Slot::Released => HandleState::Released,
        }
    }

    /// Model bound to this handle, if ready
    pub fn model(&self) -> Option<&ModelConfig> {
        match &self.slot {
            Slot::Ready { model, .. } => Some(model),
            _ => None,
        }
    }

    /// Load the model bytes and construct the engine.
    ///
    /// On failure the handle stays `Uninitialized`.
    pub fn initialize(
        &mut self,
        model: &ModelConfig,
        assets: &dyn AssetSource,
        factory: &dyn EngineFactory,
    ) -> PoseResult<()> {
        match &self.slot {
            Slot::Uninitialized => {}
            Slot::Ready { model: current, .. } => {
                return Err(PoseError::AlreadyInitialized(
                    current.asset_name().to_string(),
                ))
            }
            Slot::Released => return Err(PoseError::HandleReleased),
        }

        let _span = tracing::debug_span!("initialize", model = model.asset_name()).entered();

        let bytes = assets.load(model)?;
        tracing::debug!("Loaded {} ({} bytes)", model.file_name(), bytes.len());

        let engine = factory
            .create(model, &bytes)
            .map_err(|e| PoseError::InitializationFailed(format!("{e:#}")))?;

        tracing::info!("Pose landmarker ready with model {}", model.asset_name());

        self.slot = Slot::Ready {
            model: model.clone(),
            engine,
        };
        Ok(())
    }

    /// Run inference on one image, synchronously on the calling thread
    pub fn detect(&mut self, image: &RgbImage) -> PoseResult<RawPoseResult> {
        match &mut self.slot {
            Slot::Uninitialized => Err(PoseError::NotInitialized),
            Slot::Released => Err(PoseError::HandleReleased),
            Slot::Ready { engine, .. } => {
                let _span = tracing::debug_span!("detect").entered();
                engine
                    .detect(image)
                    .map_err(|e| PoseError::InferenceFailed(format!("{e:#}")))
            }
        }
    }

    /// Release the engine. Idempotent.
    pub fn close(&mut self) {
        let previous = std::mem::replace(&mut self.slot, Slot::Released);
        if let Slot::Ready { model, engine } = previous {
            drop(engine);
            tracing::info!("Released pose landmarker for model {}", model.asset_name());
        }
    }
}

impl Default for DetectorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarker::RawLandmark;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticAssets;

    impl AssetSource for StaticAssets {
        fn load(&self, model: &ModelConfig) -> PoseResult<Vec<u8>> {
            match model.asset_name() {
                "missing" => Err(PoseError::AssetNotFound(model.file_name())),
                _ => Ok(vec![1, 2, 3]),
            }
        }
    }

    struct CountingEngine {
        drops: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PoseEngine for CountingEngine {
        fn detect(&mut self, _image: &RgbImage) -> Result<RawPoseResult> {
            if self.fail {
                return Err(anyhow!("malformed tensor"));
            }
            let landmark = RawLandmark {
                x: 0.5,
                y: 0.5,
                z: 0.0,
                visibility: 0.9,
            };
            Ok(RawPoseResult {
                poses: vec![vec![landmark; 33]],
            })
        }
    }

    impl Drop for CountingEngine {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct TestFactory {
        reject: bool,
        failing_engine: bool,
        drops: Arc<AtomicUsize>,
    }

    impl EngineFactory for TestFactory {
        fn create(&self, _model: &ModelConfig, bytes: &[u8]) -> Result<Box<dyn PoseEngine>> {
            if self.reject {
                return Err(anyhow!("unsupported opset").context("bad model"));
            }
            assert_eq!(bytes, &[1, 2, 3]);
            Ok(Box::new(CountingEngine {
                drops: self.drops.clone(),
                fail: self.failing_engine,
            }))
        }
    }

    fn lite() -> ModelConfig {
        ModelConfig::new("pose_landmark_lite").unwrap()
    }

    #[test]
    fn detect_before_initialize_is_not_initialized() {
        let mut handle = DetectorHandle::new();
        let err = handle.detect(&RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, PoseError::NotInitialized));
    }

    #[test]
    fn initialize_then_detect() {
        let mut handle = DetectorHandle::new();
        handle
            .initialize(&lite(), &StaticAssets, &TestFactory::default())
            .unwrap();
        assert_eq!(handle.state(), HandleState::Ready);
        assert_eq!(handle.model(), Some(&lite()));

        let result = handle.detect(&RgbImage::new(2, 2)).unwrap();
        assert_eq!(result.poses.len(), 1);
        assert_eq!(result.poses[0].len(), 33);
    }

    #[test]
    fn second_initialize_is_rejected() {
        let mut handle = DetectorHandle::new();
        let factory = TestFactory::default();
        handle.initialize(&lite(), &StaticAssets, &factory).unwrap();

        let other = ModelConfig::new("pose_landmark_full").unwrap();
        let err = handle.initialize(&other, &StaticAssets, &factory).unwrap_err();
        assert!(matches!(err, PoseError::AlreadyInitialized(ref m) if m == "pose_landmark_lite"));
        assert_eq!(handle.model(), Some(&lite()));
    }

    #[test]
    fn failed_initialize_stays_uninitialized() {
        let mut handle = DetectorHandle::new();
        let factory = TestFactory {
            reject: true,
            ..Default::default()
        };
        let err = handle.initialize(&lite(), &StaticAssets, &factory).unwrap_err();
        match err {
            PoseError::InitializationFailed(reason) => {
                assert!(reason.contains("bad model"));
                assert!(reason.contains("unsupported opset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(handle.state(), HandleState::Uninitialized);
    }

    #[test]
    fn missing_asset_propagates() {
        let mut handle = DetectorHandle::new();
        let missing = ModelConfig::new("missing").unwrap();
        let err = handle
            .initialize(&missing, &StaticAssets, &TestFactory::default())
            .unwrap_err();
        assert!(matches!(err, PoseError::AssetNotFound(_)));
        assert_eq!(handle.state(), HandleState::Uninitialized);
    }

    #[test]
    fn engine_failure_is_inference_failed() {
        let mut handle = DetectorHandle::new();
        let factory = TestFactory {
            failing_engine: true,
            ..Default::default()
        };
        handle.initialize(&lite(), &StaticAssets, &factory).unwrap();

        let err = handle.detect(&RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, PoseError::InferenceFailed(ref r) if r.contains("malformed tensor")));
        assert_eq!(handle.state(), HandleState::Ready);
    }

    #[test]
    fn close_releases_engine_once() {
        let mut handle = DetectorHandle::new();
        let factory = TestFactory::default();
        handle.initialize(&lite(), &StaticAssets, &factory).unwrap();

        handle.close();
        assert_eq!(factory.drops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), HandleState::Released);

        handle.close();
        assert_eq!(factory.drops.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), HandleState::Released);
    }

    #[test]
    fn detect_after_close_is_released() {
        let mut handle = DetectorHandle::new();
        handle
            .initialize(&lite(), &StaticAssets, &TestFactory::default())
            .unwrap();
        handle.close();

        let err = handle.detect(&RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, PoseError::HandleReleased));

        let err = handle
            .initialize(&lite(), &StaticAssets, &TestFactory::default())
            .unwrap_err();
        assert!(matches!(err, PoseError::HandleReleased));
    }

    #[test]
    fn drop_releases_engine() {
        let factory = TestFactory::default();
        {
            let mut handle = DetectorHandle::new();
            handle.initialize(&lite(), &StaticAssets, &factory).unwrap();
        }
        assert_eq!(factory.drops.load(Ordering::SeqCst), 1);
    }
}
