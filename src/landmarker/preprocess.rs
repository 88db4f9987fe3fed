use anyhow::{bail, Result};
use image::{imageops, RgbImage};
use ndarray::Array4;

use super::{RawLandmark, RawPoseResult, POSE_LANDMARK_COUNT};

/// Values per landmark in the model output: x, y, z, visibility, presence.
/// Presence is not decoded.
const LANDMARK_STRIDE: usize = 5;

/// Converts RGB frames into landmark-model input tensors and decodes the
/// model's landmark tensor back into image-relative coordinates
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGB image into a normalized NHWC tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize to [0, 1]
    ///
    /// Returns: Array4<f32> with shape [1, height, width, 3]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        if image.width() == 0 || image.height() == 0 {
            bail!("image has zero dimensions");
        }

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Triangle,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 3));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(tensor)
    }

    /// Decode the flat landmark tensor of one pose.
    ///
    /// The first [`POSE_LANDMARK_COUNT`] entries are body landmarks; trailing
    /// auxiliary points are dropped. When `pose_score` is below
    /// `presence_threshold` no pose is reported. Non-finite model output is an
    /// error.
    pub fn decode_landmarks(
        &self,
        raw: &[f32],
        pose_score: f32,
        presence_threshold: f32,
    ) -> Result<RawPoseResult> {
        let _span = tracing::debug_span!("decode_landmarks").entered();

        if !pose_score.is_finite() {
            bail!("pose score is not finite: {}", pose_score);
        }

        if pose_score < presence_threshold {
            tracing::debug!(
                "Pose score {:.3} below threshold {:.3}",
                pose_score,
                presence_threshold
            );
            return Ok(RawPoseResult::empty());
        }

        if raw.len() < POSE_LANDMARK_COUNT * LANDMARK_STRIDE {
            bail!(
                "landmark tensor has {} values, expected at least {}",
                raw.len(),
                POSE_LANDMARK_COUNT * LANDMARK_STRIDE
            );
        }

        let width = self.target_width as f32;
        let height = self.target_height as f32;

        let mut landmarks = Vec::with_capacity(POSE_LANDMARK_COUNT);
        for (i, v) in raw
            .chunks_exact(LANDMARK_STRIDE)
            .take(POSE_LANDMARK_COUNT)
            .enumerate()
        {
            if v[..4].iter().any(|value| !value.is_finite()) {
                bail!("landmark {} has non-finite values: {:?}", i, &v[..4]);
            }
            landmarks.push(RawLandmark {
                x: v[0] / width,
                y: v[1] / height,
                z: v[2] / width,
                visibility: sigmoid(v[3]),
            });
        }

        Ok(RawPoseResult {
            poses: vec![landmarks],
        })
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
