use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::error::{MediaError, MediaResult};

/// OS-level media metadata lookups
pub trait MediaMetadata: Send {
    /// Duration of a video in seconds, rounded to millisecond precision
    fn duration_seconds(&self, path: &Path) -> MediaResult<f64>;
}

/// Reads container metadata with `ffprobe`
#[derive(Debug, Clone)]
pub struct FfprobeMetadata {
    program: PathBuf,
}

impl FfprobeMetadata {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeMetadata {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaMetadata for FfprobeMetadata {
    fn duration_seconds(&self, path: &Path) -> MediaResult<f64> {
        tracing::debug!("Probing {} with {}", path.display(), self.program.display());

        let output = Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| {
                MediaError::Processing(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(MediaError::Processing(if stderr.is_empty() {
                format!("ffprobe exited with {}", output.status)
            } else {
                stderr.to_string()
            }));
        }

        parse_probe_output(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Extract `format.duration` from ffprobe's JSON output
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<f64> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::DurationUnavailable(format!("unreadable probe output: {e}")))?;

    let raw = probe
        .format
        .and_then(|format| format.duration)
        .ok_or_else(|| MediaError::DurationUnavailable("no duration in container".to_string()))?;

    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| MediaError::DurationUnavailable(format!("unparseable duration {raw:?}")))?;

    validate_duration(seconds)
}

/// Reject NaN, infinite and negative durations; round to milliseconds
pub fn validate_duration(seconds: f64) -> MediaResult<f64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(MediaError::InvalidDuration(seconds));
    }
    Ok((seconds * 1000.0).round() / 1000.0)
}
