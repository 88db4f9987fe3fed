use std::io::Cursor;
use std::path::Path;

use image::{ImageReader, RgbImage};

use crate::error::{PoseError, PoseResult};

/// Decodes an image file into the RGB frame the pose engine consumes
pub trait ImageSource: Send {
    fn load(&self, path: &Path) -> PoseResult<RgbImage>;
}

/// Reads raster images from the local filesystem.
///
/// The format is sniffed from the file contents, not the extension. No
/// resizing or normalization happens here.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageLoader;

impl ImageSource for FsImageLoader {
    fn load(&self, path: &Path) -> PoseResult<RgbImage> {
        let _span = tracing::debug_span!("load_image").entered();

        let bytes = std::fs::read(path)
            .map_err(|_| PoseError::ImageNotFound(path.display().to_string()))?;

        let decode_err = |reason: String| PoseError::ImageDecode {
            path: path.display().to_string(),
            reason,
        };

        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?
            .decode()
            .map_err(|e| decode_err(e.to_string()))?;

        tracing::debug!(
            "Decoded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        Ok(image.to_rgb8())
    }
}
