//! PNG asset store rooted at the storage directory.

use std::path::{Path, PathBuf};

use image::{GrayImage, ImageError, RgbImage};
use serde::{Deserialize, Serialize};

use lucent_core::{ExplainError, Result};

/// Reference to one persisted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Path relative to the storage root, forward slashes.
    pub path: String,
    /// Public URL under the static mount.
    pub url: String,
}

impl AssetRef {
    fn new(relative: &str) -> Self {
        Self {
            path: relative.to_string(),
            url: format!("/static/{relative}"),
        }
    }
}

/// Writes PNG assets under a storage root and hands back [`AssetRef`]s.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a relative asset path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a grayscale PNG at `relative`, creating parent directories.
    pub fn save_gray(&self, relative: &str, image: &GrayImage) -> Result<AssetRef> {
        let target = self.prepare(relative)?;
        image
            .save_with_format(&target, image::ImageFormat::Png)
            .map_err(image_error)?;
        Ok(AssetRef::new(relative))
    }

    /// Write an RGB PNG at `relative`, creating parent directories.
    pub fn save_rgb(&self, relative: &str, image: &RgbImage) -> Result<AssetRef> {
        let target = self.prepare(relative)?;
        image
            .save_with_format(&target, image::ImageFormat::Png)
            .map_err(image_error)?;
        Ok(AssetRef::new(relative))
    }

    fn prepare(&self, relative: &str) -> Result<PathBuf> {
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(target)
    }
}

fn image_error(err: ImageError) -> ExplainError {
    match err {
        ImageError::IoError(io) => ExplainError::Io(io),
        other => ExplainError::Internal(format!("png encode failed: {other}")),
    }
}
