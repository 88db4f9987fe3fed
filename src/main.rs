use anyhow::{Context, Result};
use clap::Parser;
use pose_bridge::config::{
    DEFAULT_ASSETS_DIR, DEFAULT_FFPROBE_PROGRAM, DEFAULT_INTRA_THREADS, DEFAULT_MODEL_ASSET,
    DEFAULT_PRESENCE_THRESHOLD, MODEL_FILE_EXTENSION,
};
use pose_bridge::{Bridge, BridgeConfig, BridgeResponse, BridgeWorker, HandlePolicy};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Operation to invoke (runPoseEstimationOnImage, getVideoDuration)
    method: String,

    /// Operation arguments as a JSON object
    #[arg(long, default_value = "{}")]
    args: String,

    /// Directory holding packaged model assets
    #[arg(long, default_value = DEFAULT_ASSETS_DIR)]
    assets_dir: PathBuf,

    /// Suffix appended to model asset names
    #[arg(long, default_value = MODEL_FILE_EXTENSION)]
    model_extension: String,

    /// Model used when the request does not name one
    #[arg(long, default_value = DEFAULT_MODEL_ASSET)]
    default_model: String,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = DEFAULT_INTRA_THREADS)]
    intra_threads: usize,

    /// Minimum pose-presence probability
    #[arg(long, default_value_t = DEFAULT_PRESENCE_THRESHOLD)]
    presence_threshold: f32,

    /// ffprobe executable used for video metadata
    #[arg(long, default_value = DEFAULT_FFPROBE_PROGRAM)]
    ffprobe: PathBuf,

    /// Build a fresh detector for every request instead of reusing one
    #[arg(long)]
    per_request_handles: bool,

    /// Give up waiting for the response after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            assets_dir: self.assets_dir.clone(),
            model_extension: self.model_extension.clone(),
            default_model: self.default_model.clone(),
            intra_threads: self.intra_threads,
            presence_threshold: self.presence_threshold,
            ffprobe_program: self.ffprobe.clone(),
            handle_policy: if self.per_request_handles {
                HandlePolicy::PerRequest
            } else {
                HandlePolicy::Reuse
            },
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let arguments: serde_json::Value =
        serde_json::from_str(&args.args).context("Failed to parse --args as JSON")?;

    let config = args.bridge_config();
    tracing::info!("Assets: {}", config.assets_dir.display());
    tracing::info!("Default model: {}", config.default_model);

    let worker = BridgeWorker::spawn(Bridge::from_config(&config))
        .context("Failed to start bridge worker")?;

    let response = match args.timeout_ms {
        Some(ms) => worker.call_timeout(&args.method, arguments, Duration::from_millis(ms)),
        None => worker.call(&args.method, arguments),
    };

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            // The worker may still be busy with the abandoned call
            worker.detach();
            return Err(e).context("Bridge call failed");
        }
    };

    worker.shutdown();

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to encode response")?
    );

    if !matches!(response, BridgeResponse::Success { .. }) {
        std::process::exit(1);
    }

    Ok(())
}
