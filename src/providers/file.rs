//! Providers backed by precomputed files
//!
//! Used when segmentation and pose estimation were run elsewhere, e.g. by a
//! browser model or a separate batch job.

use crate::{
    error::{MockupError, Result},
    pose::{parse_landmarks_json, LandmarkSet},
    providers::{PoseProvider, SegmentationProvider},
    services::ImageIOService,
    types::Mask,
};
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Segmentation provider reading a grayscale mask image
///
/// White is foreground. When the file carries a non-opaque alpha channel the
/// alpha is used instead, so cut-out PNGs work as masks too. Masks of a
/// different size are resampled to the photo.
#[derive(Debug, Clone)]
pub struct MaskImageProvider {
    path: PathBuf,
}

impl MaskImageProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SegmentationProvider for MaskImageProvider {
    fn name(&self) -> &str {
        "mask-file"
    }

    async fn segment(&self, image: &RgbaImage) -> Result<Mask> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| {
                let details = format!("cannot read '{}': {e}", self.path.display());
                MockupError::provider_error(self.name(), "Segmentation", &details)
            })?;
        let decoded = ImageIOService::load_from_bytes(&bytes)
            .map_err(|e| MockupError::provider_error(self.name(), "Segmentation", &e.to_string()))?;

        let rgba = decoded.to_rgba8();
        let mask = if rgba.pixels().any(|p| p[3] < 255) {
            let alpha = image::GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                image::Luma([rgba.get_pixel(x, y)[3]])
            });
            Mask::from_luma(&alpha)
        } else {
            Mask::from_luma(&decoded.to_luma8())
        };

        let (width, height) = image.dimensions();
        if mask.dimensions() == (width, height) {
            Ok(mask)
        } else {
            debug!(
                "Resampling {:?} mask from {} to {}x{}",
                mask.dimensions(),
                self.path.display(),
                width,
                height
            );
            mask.resize(width, height)
        }
    }
}

/// Pose provider reading landmark JSON
#[derive(Debug, Clone)]
pub struct LandmarkFileProvider {
    path: PathBuf,
}

impl LandmarkFileProvider {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PoseProvider for LandmarkFileProvider {
    fn name(&self) -> &str {
        "landmark-file"
    }

    async fn detect_pose(&self, _image: &RgbaImage) -> Result<Option<LandmarkSet>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| {
                let details = format!("cannot read '{}': {e}", self.path.display());
                MockupError::provider_error(self.name(), "Pose detection", &details)
            })?;
        parse_landmarks_json(&text)
            .map_err(|e| MockupError::provider_error(self.name(), "Pose detection", &e.to_string()))
    }
}
