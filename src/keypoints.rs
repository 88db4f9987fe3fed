use serde::{Deserialize, Serialize};

use crate::landmarker::RawPoseResult;

/// One landmark as returned across the bridge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub score: f32,
}

/// Flatten every detected pose into one keypoint sequence.
///
/// Poses keep the engine's order, landmarks keep the model topology order.
/// Nothing is filtered or thresholded.
pub fn normalize(raw: &RawPoseResult) -> Vec<Keypoint> {
    raw.poses
        .iter()
        .flatten()
        .map(|landmark| Keypoint {
            x: landmark.x,
            y: landmark.y,
            z: landmark.z,
            score: landmark.visibility,
        })
        .collect()
}
