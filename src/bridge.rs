//! Named-operation dispatcher between the application shell and the pose core.
//!
//! Every request resolves to exactly one [`BridgeResponse`]: a success payload,
//! an error with one of the [`ErrorCode`]s, or `NotImplemented` for an unknown
//! operation name. Nothing below this boundary escapes as a panic or an
//! untyped error.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::assets::{BundledAssets, ModelConfig};
use crate::config::BridgeConfig;
use crate::error::{ErrorCode, PoseError};
use crate::image_loader::FsImageLoader;
use crate::landmarker::create_default_factory;
use crate::media::{FfprobeMetadata, MediaMetadata};
use crate::session::{PoseEstimationRequest, PoseSession};

/// Channel name the application shell registers the bridge under
pub const CHANNEL_NAME: &str = "pose_native";

/// Response key wrapping the keypoint list
pub const KEYPOINTS_KEY: &str = "keypoints";

pub type ArgumentBag = Map<String, Value>;

/// Supported operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RunPoseEstimationOnImage,
    GetVideoDuration,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::RunPoseEstimationOnImage => "runPoseEstimationOnImage",
            Operation::GetVideoDuration => "getVideoDuration",
        }
    }
}

impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "runPoseEstimationOnImage" => Ok(Operation::RunPoseEstimationOnImage),
            "getVideoDuration" => Ok(Operation::GetVideoDuration),
            _ => Err(()),
        }
    }
}

/// Transport-safe outcome of one bridge call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BridgeResponse {
    Success {
        payload: Value,
    },
    Error {
        code: ErrorCode,
        message: String,
        details: Option<String>,
    },
    NotImplemented,
}

impl BridgeResponse {
    pub fn success(payload: Value) -> Self {
        BridgeResponse::Success { payload }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>, details: Option<&str>) -> Self {
        BridgeResponse::Error {
            code,
            message: message.into(),
            details: details.map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BridgeResponse::Success { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            BridgeResponse::Error { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Dispatches named operations onto a [`PoseSession`] and a media collaborator
pub struct Bridge {
    session: PoseSession,
    media: Box<dyn MediaMetadata>,
    default_model: String,
    model_extension: String,
}

impl Bridge {
    pub fn new(
        session: PoseSession,
        media: Box<dyn MediaMetadata>,
        default_model: impl Into<String>,
        model_extension: impl Into<String>,
    ) -> Self {
        Self {
            session,
            media,
            default_model: default_model.into(),
            model_extension: model_extension.into(),
        }
    }

    /// Bridge backed by bundled ONNX assets, filesystem images and ffprobe
    pub fn from_config(config: &BridgeConfig) -> Self {
        let session = PoseSession::new(
            Box::new(BundledAssets::new(&config.assets_dir)),
            Box::new(FsImageLoader),
            create_default_factory(config),
            config.handle_policy,
        );
        Self::new(
            session,
            Box::new(FfprobeMetadata::new(config.ffprobe_program.clone())),
            config.default_model.clone(),
            config.model_extension.clone(),
        )
    }

    pub fn session(&self) -> &PoseSession {
        &self.session
    }

    /// Handle one request. `arguments` is expected to be a JSON object; any
    /// other value is treated as an empty argument bag.
    pub fn handle(&mut self, operation: &str, arguments: &Value) -> BridgeResponse {
        let Ok(op) = operation.parse::<Operation>() else {
            tracing::debug!("Unknown operation {:?}", operation);
            return BridgeResponse::NotImplemented;
        };

        let empty = ArgumentBag::new();
        let args = arguments.as_object().unwrap_or(&empty);

        let response = match op {
            Operation::RunPoseEstimationOnImage => self.run_pose_estimation(args),
            Operation::GetVideoDuration => self.video_duration(args),
        };

        if let BridgeResponse::Error {
            code,
            message,
            details,
        } = &response
        {
            tracing::warn!(
                "{} failed with {} ({}): {}",
                op.as_str(),
                code,
                details.as_deref().unwrap_or("-"),
                message
            );
        }

        response
    }

    /// Close every detector handle owned by this bridge
    pub fn close(&mut self) {
        self.session.close();
    }

    fn run_pose_estimation(&mut self, args: &ArgumentBag) -> BridgeResponse {
        let request = match self.pose_request(args) {
            Ok(request) => request,
            Err(e) => return invalid_argument(&e),
        };

        tracing::info!("Using model: {}", request.model.asset_name());

        match self.session.estimate(&request) {
            Ok(keypoints) => {
                let mut payload = Map::new();
                payload.insert(KEYPOINTS_KEY.to_string(), json!(keypoints));
                BridgeResponse::success(Value::Object(payload))
            }
            Err(e) => BridgeResponse::error(
                ErrorCode::PoseEstimationFailed,
                e.to_string(),
                Some(e.kind()),
            ),
        }
    }

    fn pose_request(&self, args: &ArgumentBag) -> Result<PoseEstimationRequest, PoseError> {
        let image_path = required_path(args, "imagePath")?;

        let model_name = match args.get("modelAssetName") {
            None | Some(Value::Null) => self.default_model.as_str(),
            Some(Value::String(name)) if !name.is_empty() => name.as_str(),
            Some(_) => {
                return Err(PoseError::InvalidArgument(
                    "modelAssetName must be a non-empty string".to_string(),
                ))
            }
        };

        Ok(PoseEstimationRequest {
            image_path,
            model: ModelConfig::with_extension(model_name, self.model_extension.as_str())?,
        })
    }

    fn video_duration(&self, args: &ArgumentBag) -> BridgeResponse {
        let video_path = match required_path(args, "videoPath") {
            Ok(path) => path,
            Err(e) => return invalid_argument(&e),
        };

        match self.media.duration_seconds(&video_path) {
            Ok(seconds) => BridgeResponse::success(json!(seconds)),
            Err(e) => BridgeResponse::error(e.code(), e.to_string(), Some(e.kind())),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.close();
    }
}

fn required_path(args: &ArgumentBag, key: &str) -> Result<PathBuf, PoseError> {
    match args.get(key).and_then(Value::as_str) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(PoseError::InvalidArgument(format!("{key} is required"))),
    }
}

fn invalid_argument(err: &PoseError) -> BridgeResponse {
    BridgeResponse::error(ErrorCode::InvalidArgument, err.to_string(), Some(err.kind()))
}
