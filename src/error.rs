use serde::Serialize;
use thiserror::Error;

pub type PoseResult<T> = Result<T, PoseError>;
pub type MediaResult<T> = Result<T, MediaError>;

/// Failures inside the pose-estimation core.
#[derive(Debug, Error)]
pub enum PoseError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("model asset not found: {0}")]
    AssetNotFound(String),

    #[error("failed to read model asset {name}: {source}")]
    AssetRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize pose landmarker: {0}")]
    InitializationFailed(String),

    #[error("pose landmarker is already initialized with model {0}")]
    AlreadyInitialized(String),

    #[error("pose landmarker is not initialized")]
    NotInitialized,

    #[error("pose landmarker handle has been released")]
    HandleReleased,

    #[error("failed to load image from path: {0}")]
    ImageNotFound(String),

    #[error("failed to decode image {path}: {reason}")]
    ImageDecode { path: String, reason: String },

    #[error("pose detection failed: {0}")]
    InferenceFailed(String),
}

impl PoseError {
    /// Stable cause name carried across the bridge as `details`.
    pub fn kind(&self) -> &'static str {
        match self {
            PoseError::InvalidArgument(_) => "INVALID_ARGUMENT",
            PoseError::AssetNotFound(_) => "ASSET_NOT_FOUND",
            PoseError::AssetRead { .. } => "ASSET_READ_ERROR",
            PoseError::InitializationFailed(_) => "INITIALIZATION_FAILED",
            PoseError::AlreadyInitialized(_) => "ALREADY_INITIALIZED",
            PoseError::NotInitialized => "NOT_INITIALIZED",
            PoseError::HandleReleased => "HANDLE_RELEASED",
            PoseError::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            PoseError::ImageDecode { .. } => "IMAGE_DECODE_ERROR",
            PoseError::InferenceFailed(_) => "INFERENCE_FAILED",
        }
    }
}

/// Failures from the media-metadata collaborator.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("could not extract video duration: {0}")]
    DurationUnavailable(String),

    #[error("invalid video duration: {0}")]
    InvalidDuration(f64),

    #[error("video processing failed: {0}")]
    Processing(String),
}

impl MediaError {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::DurationUnavailable(_) => "DURATION_UNAVAILABLE",
            MediaError::InvalidDuration(_) => "INVALID_DURATION",
            MediaError::Processing(_) => "PROCESSING_FAILED",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            MediaError::DurationUnavailable(_) | MediaError::InvalidDuration(_) => {
                ErrorCode::DurationExtractionFailed
            }
            MediaError::Processing(_) => ErrorCode::VideoProcessingFailed,
        }
    }
}

/// The closed set of failure codes visible to bridge callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArgument,
    PoseEstimationFailed,
    DurationExtractionFailed,
    VideoProcessingFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::PoseEstimationFailed => "POSE_ESTIMATION_FAILED",
            ErrorCode::DurationExtractionFailed => "DURATION_EXTRACTION_FAILED",
            ErrorCode::VideoProcessingFailed => "VIDEO_PROCESSING_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
