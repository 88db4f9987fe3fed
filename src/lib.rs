//! Single-image body-pose estimation behind a named-operation bridge.
//!
//! The [`bridge::Bridge`] validates requests and maps every failure onto a
//! small set of [`error::ErrorCode`]s. A [`session::PoseSession`] owns the
//! [`landmarker::DetectorHandle`]s that wrap the inference engine, one per
//! model. Use [`worker::BridgeWorker`] to keep inference off the caller's
//! thread.

pub mod assets;
pub mod bridge;
pub mod config;
pub mod error;
pub mod image_loader;
pub mod keypoints;
pub mod landmarker;
pub mod media;
pub mod session;
pub mod worker;

pub use assets::{AssetSource, BundledAssets, ModelConfig};
pub use bridge::{ArgumentBag, Bridge, BridgeResponse, Operation};
pub use config::BridgeConfig;
pub use error::{ErrorCode, MediaError, PoseError, PoseResult};
pub use image_loader::{FsImageLoader, ImageSource};
pub use keypoints::Keypoint;
pub use landmarker::{DetectorHandle, EngineFactory, HandleState, PoseEngine, RawPoseResult};
pub use media::{FfprobeMetadata, MediaMetadata};
pub use session::{HandlePolicy, PoseEstimationRequest, PoseSession};
pub use worker::{BridgeWorker, WorkerError};
