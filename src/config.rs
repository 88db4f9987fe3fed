use std::path::PathBuf;

use crate::session::HandlePolicy;

pub const DEFAULT_MODEL_ASSET: &str = "pose_landmark_lite";
pub const MODEL_FILE_EXTENSION: &str = "onnx";
pub const DEFAULT_ASSETS_DIR: &str = "assets";
pub const DEFAULT_INTRA_THREADS: usize = 4;
pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_FFPROBE_PROGRAM: &str = "ffprobe";

/// Runtime settings for a bridge instance
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Directory holding the packaged model assets
    pub assets_dir: PathBuf,
    /// Suffix appended to every model asset name
    pub model_extension: String,
    /// Model used when a request does not name one
    pub default_model: String,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
    /// Minimum pose-presence probability for a pose to be reported
    pub presence_threshold: f32,
    /// Program used to read video metadata
    pub ffprobe_program: PathBuf,
    pub handle_policy: HandlePolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            model_extension: MODEL_FILE_EXTENSION.to_string(),
            default_model: DEFAULT_MODEL_ASSET.to_string(),
            intra_threads: DEFAULT_INTRA_THREADS,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
            ffprobe_program: PathBuf::from(DEFAULT_FFPROBE_PROGRAM),
            handle_policy: HandlePolicy::Reuse,
        }
    }
}
