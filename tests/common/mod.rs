#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::RgbImage;
use pose_bridge::landmarker::RawLandmark;
use pose_bridge::{
    AssetSource, Bridge, BundledAssets, EngineFactory, FsImageLoader, HandlePolicy, ImageSource,
    MediaError, MediaMetadata, ModelConfig, PoseEngine, PoseError, PoseResult, PoseSession,
    RawPoseResult,
};

/// Call counters shared between a test and its fakes
#[derive(Clone, Default)]
pub struct Calls {
    pub asset_loads: Arc<AtomicUsize>,
    pub image_loads: Arc<AtomicUsize>,
    pub engines_created: Arc<AtomicUsize>,
    pub engines_released: Arc<AtomicUsize>,
    pub detections: Arc<AtomicUsize>,
    pub models_seen: Arc<Mutex<Vec<String>>>,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Serves fake model bytes for every name except `missing_model`
pub struct FakeAssets(pub Calls);

impl AssetSource for FakeAssets {
    fn load(&self, model: &ModelConfig) -> PoseResult<Vec<u8>> {
        self.0.asset_loads.fetch_add(1, Ordering::SeqCst);
        if model.asset_name() == "missing_model" {
            return Err(PoseError::AssetNotFound(model.file_name()));
        }
        Ok(model.asset_name().as_bytes().to_vec())
    }
}

/// Real filesystem decoding, counted
pub struct CountingImages(pub Calls);

impl ImageSource for CountingImages {
    fn load(&self, path: &Path) -> PoseResult<RgbImage> {
        self.0.image_loads.fetch_add(1, Ordering::SeqCst);
        FsImageLoader.load(path)
    }
}

/// Reports one 33-point pose for images wider than tall, none otherwise
pub struct FakeEngine {
    calls: Calls,
    delay: Duration,
}

impl PoseEngine for FakeEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<RawPoseResult> {
        self.calls.detections.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if image.width() == 1 && image.height() == 1 {
            return Err(anyhow!("input tensor too small"));
        }
        if image.height() > image.width() {
            return Ok(RawPoseResult::empty());
        }

        let pose = (0..33)
            .map(|i| RawLandmark {
                x: i as f32 / 33.0,
                y: 1.0 - i as f32 / 33.0,
                z: -0.01 * i as f32,
                visibility: 0.5 + i as f32 / 100.0,
            })
            .collect();
        Ok(RawPoseResult { poses: vec![pose] })
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.calls.engines_released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeFactory {
    pub calls: Calls,
    pub delay: Duration,
}

impl EngineFactory for FakeFactory {
    fn create(&self, model: &ModelConfig, model_bytes: &[u8]) -> Result<Box<dyn PoseEngine>> {
        if model_bytes == b"corrupt_model" {
            return Err(anyhow!("invalid protobuf"));
        }
        self.calls.engines_created.fetch_add(1, Ordering::SeqCst);
        self.calls
            .models_seen
            .lock()
            .unwrap()
            .push(model.asset_name().to_string());
        Ok(Box::new(FakeEngine {
            calls: self.calls.clone(),
            delay: self.delay,
        }))
    }
}

/// Durations keyed by file name
pub struct FakeMedia;

impl MediaMetadata for FakeMedia {
    fn duration_seconds(&self, path: &Path) -> Result<f64, MediaError> {
        match path.file_name().and_then(|n| n.to_str()) {
            Some("clip.mp4") => Ok(10.5),
            Some("no_duration.mp4") => Err(MediaError::DurationUnavailable(
                "no duration in container".into(),
            )),
            Some("nan.mp4") => pose_bridge::media::validate_duration(f64::NAN),
            _ => Err(MediaError::Processing(format!(
                "{}: Invalid data found when processing input",
                path.display()
            ))),
        }
    }
}

pub fn bridge_with(calls: &Calls, policy: HandlePolicy, delay: Duration) -> Bridge {
    let session = PoseSession::new(
        Box::new(FakeAssets(calls.clone())),
        Box::new(CountingImages(calls.clone())),
        Box::new(FakeFactory {
            calls: calls.clone(),
            delay,
        }),
        policy,
    );
    Bridge::new(session, Box::new(FakeMedia), "pose_landmark_lite", "onnx")
}

/// Bridge reading model bytes from `assets_dir` with the given file extension
pub fn bridge_on_disk(calls: &Calls, assets_dir: &Path, model_extension: &str) -> Bridge {
    let session = PoseSession::new(
        Box::new(BundledAssets::new(assets_dir)),
        Box::new(CountingImages(calls.clone())),
        Box::new(FakeFactory {
            calls: calls.clone(),
            delay: Duration::ZERO,
        }),
        HandlePolicy::Reuse,
    );
    Bridge::new(session, Box::new(FakeMedia), "lite", model_extension)
}

pub fn bridge(calls: &Calls) -> Bridge {
    bridge_with(calls, HandlePolicy::Reuse, Duration::ZERO)
}

/// Write a solid-color PNG and return its path
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(width, height, image::Rgb([90, 120, 150]))
        .save(&path)
        .unwrap();
    path
}
