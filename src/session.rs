use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::assets::{AssetSource, ModelConfig};
use crate::error::PoseResult;
use crate::image_loader::ImageSource;
use crate::keypoints::{self, Keypoint};
use crate::landmarker::{DetectorHandle, EngineFactory};

/// When a session builds and tears down detector handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlePolicy {
    /// Keep one ready handle per model for the session's lifetime
    #[default]
    Reuse,
    /// Build a handle for each request and close it afterwards
    PerRequest,
}

/// A validated pose-estimation request
#[derive(Debug, Clone, PartialEq)]
pub struct PoseEstimationRequest {
    pub image_path: PathBuf,
    pub model: ModelConfig,
}

/// Exclusive owner of the detector handles used by one bridge.
///
/// Handles live until [`PoseSession::release`] or [`PoseSession::close`];
/// the session never shares a handle between concurrent callers since every
/// operation takes `&mut self`.
pub struct PoseSession {
    assets: Box<dyn AssetSource>,
    images: Box<dyn ImageSource>,
    factory: Box<dyn EngineFactory>,
    policy: HandlePolicy,
    handles: HashMap<ModelConfig, DetectorHandle>,
}

impl PoseSession {
    pub fn new(
        assets: Box<dyn AssetSource>,
        images: Box<dyn ImageSource>,
        factory: Box<dyn EngineFactory>,
        policy: HandlePolicy,
    ) -> Self {
        Self {
            assets,
            images,
            factory,
            policy,
            handles: HashMap::new(),
        }
    }

    pub fn policy(&self) -> HandlePolicy {
        self.policy
    }

    /// Models with a ready handle, sorted by name
    pub fn loaded_models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handles.keys().map(|m| m.asset_name()).collect();
        names.sort_unstable();
        names
    }

    /// Decode the image, run the model and flatten its landmarks
    pub fn estimate(&mut self, request: &PoseEstimationRequest) -> PoseResult<Vec<Keypoint>> {
        let _span = tracing::debug_span!("estimate", model = request.model.asset_name()).entered();

        // Load the handle first so a missing model is reported before image errors
        let handle = ready_handle(
            &mut self.handles,
            &request.model,
            self.assets.as_ref(),
            self.factory.as_ref(),
        )?;
        let result = self
            .images
            .load(&request.image_path)
            .and_then(|image| handle.detect(&image));

        if self.policy == HandlePolicy::PerRequest {
            if let Some(mut handle) = self.handles.remove(&request.model) {
                handle.close();
            }
        }

        let keypoints = keypoints::normalize(&result?);
        tracing::debug!("Estimated {} keypoints", keypoints.len());
        Ok(keypoints)
    }

    /// Close and drop the handle for one model. Returns whether one existed.
    pub fn release(&mut self, model: &ModelConfig) -> bool {
        match self.handles.remove(model) {
            Some(mut handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Close every handle owned by this session
    pub fn close(&mut self) {
        for (_, mut handle) in self.handles.drain() {
            handle.close();
        }
    }
}

fn ready_handle<'a>(
    handles: &'a mut HashMap<ModelConfig, DetectorHandle>,
    model: &ModelConfig,
    assets: &dyn AssetSource,
    factory: &dyn EngineFactory,
) -> PoseResult<&'a mut DetectorHandle> {
    match handles.entry(model.clone()) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            // A handle whose initialization failed is dropped, never retried
            let mut handle = DetectorHandle::new();
            handle.initialize(model, assets, factory)?;
            Ok(entry.insert(handle))
        }
    }
}

impl Drop for PoseSession {
    fn drop(&mut self) {
        self.close();
    }
}
