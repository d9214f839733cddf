//! Segmentation and pose capability providers
//!
//! The body-segmentation and pose-estimation models are external; the
//! pipeline only sees these two async traits. Adapters are provided for
//! tensor-in/tensor-out model backends and for precomputed files.

pub mod file;
pub mod mock;
pub mod tensor;

use crate::{error::Result, pose::LandmarkSet, types::Mask};
use async_trait::async_trait;
use image::RgbaImage;

pub use file::{LandmarkFileProvider, MaskImageProvider};
pub use mock::{MockPoseProvider, MockSegmentationProvider, MockShape};
pub use tensor::{SegmentationBackend, TensorSegmentationProvider, TensorSpec};

/// Produces a per-pixel foreground probability mask for a photo
#[async_trait]
pub trait SegmentationProvider: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &str;

    /// Segment the person in `image`
    ///
    /// The returned mask should match the image dimensions; callers resample
    /// masks of any other size.
    ///
    /// # Errors
    /// - The underlying model fails
    async fn segment(&self, image: &RgbaImage) -> Result<Mask>;
}

/// Detects body landmarks in a photo
#[async_trait]
pub trait PoseProvider: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &str;

    /// Detect the pose in `image`; `Ok(None)` means no person was found
    ///
    /// # Errors
    /// - The underlying model fails
    async fn detect_pose(&self, image: &RgbaImage) -> Result<Option<LandmarkSet>>;
}

/// Pose provider that never detects anyone
///
/// The garment mask then falls back to segmentation only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPoseProvider;

#[async_trait]
impl PoseProvider for NoPoseProvider {
    fn name(&self) -> &str {
        "none"
    }

    async fn detect_pose(&self, _image: &RgbaImage) -> Result<Option<LandmarkSet>> {
        Ok(None)
    }
}
