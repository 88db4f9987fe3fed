use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::MODEL_FILE_EXTENSION;
use crate::error::{PoseError, PoseResult};

/// Identifies the packaged model a detector handle loads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelConfig {
    asset_name: String,
    file_extension: String,
}

impl ModelConfig {
    /// Validate a bare asset name (no directory parts, no extension).
    pub fn new(asset_name: impl Into<String>) -> PoseResult<Self> {
        Self::with_extension(asset_name, MODEL_FILE_EXTENSION)
    }

    pub fn with_extension(
        asset_name: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> PoseResult<Self> {
        let asset_name = asset_name.into();
        if !is_plain_asset_name(&asset_name) {
            return Err(PoseError::InvalidArgument(format!(
                "invalid model asset name: {asset_name:?}"
            )));
        }
        let file_extension = file_extension.into();
        if !is_plain_asset_name(&file_extension) {
            return Err(PoseError::InvalidArgument(format!(
                "invalid model file extension: {file_extension:?}"
            )));
        }
        Ok(Self {
            asset_name,
            file_extension,
        })
    }

    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.asset_name, self.file_extension)
    }
}

fn is_plain_asset_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Source of packaged model bytes
pub trait AssetSource: Send {
    /// Read the model file `model` names. Nothing is cached: every call re-reads.
    fn load(&self, model: &ModelConfig) -> PoseResult<Vec<u8>>;
}

/// Model assets stored as `<root>/<name>.<extension>` files
#[derive(Debug, Clone)]
pub struct BundledAssets {
    root: PathBuf,
}

impl BundledAssets {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn resolve(&self, model: &ModelConfig) -> PathBuf {
        self.root.join(model.file_name())
    }
}

impl AssetSource for BundledAssets {
    fn load(&self, model: &ModelConfig) -> PoseResult<Vec<u8>> {
        let path = self.resolve(model);
        tracing::debug!("Reading model asset {}", path.display());

        std::fs::read(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PoseError::AssetNotFound(path.display().to_string()),
            _ => PoseError::AssetRead {
                name: model.asset_name().to_string(),
                source,
            },
        })
    }
}
