//! Mock providers for testing and debugging
//!
//! These produce deterministic masks and landmarks without any model files,
//! and can be told to fail or to respond slowly so selection races can be
//! exercised.

use crate::{
    error::{MockupError, Result},
    pose::{BodyJoint, LandmarkSet, NormalizedPoint},
    providers::{PoseProvider, SegmentationBackend, SegmentationProvider, TensorSpec},
    types::Mask,
};
use async_trait::async_trait;
use image::RgbaImage;
use instant::Duration;
use ndarray::{Array4, Axis};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shape of the mock segmentation mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockShape {
    /// Every pixel is foreground
    Full,
    /// Centered ellipse spanning half of each dimension
    #[default]
    Ellipse,
    /// No foreground
    Empty,
}

/// Segmentation provider producing a synthetic mask
#[derive(Debug, Default)]
pub struct MockSegmentationProvider {
    shape: MockShape,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSegmentationProvider {
    #[must_use]
    pub fn new(shape: MockShape) -> Self {
        Self {
            shape,
            ..Self::default()
        }
    }

    /// Provider whose every call fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Delay every response
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `segment` calls so far
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The mask this provider returns for a canvas size
    #[must_use]
    pub fn mask_for(shape: MockShape, dimensions: (u32, u32)) -> Mask {
        match shape {
            MockShape::Full => Mask::filled(dimensions, 1.0),
            MockShape::Empty => Mask::filled(dimensions, 0.0),
            MockShape::Ellipse => {
                let (width, height) = dimensions;
                let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
                let (rx, ry) = ((width as f32 / 4.0).max(0.5), (height as f32 / 4.0).max(0.5));
                let gray = image::GrayImage::from_fn(width, height, |x, y| {
                    let dx = (x as f32 + 0.5 - cx) / rx;
                    let dy = (y as f32 + 0.5 - cy) / ry;
                    image::Luma([if dx * dx + dy * dy <= 1.0 { 255 } else { 0 }])
                });
                Mask::from_luma(&gray)
            },
        }
    }
}

#[async_trait]
impl SegmentationProvider for MockSegmentationProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn segment(&self, image: &RgbaImage) -> Result<Mask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(MockupError::provider_error("mock", "Segmentation", "simulated failure"));
        }
        Ok(Self::mask_for(self.shape, image.dimensions()))
    }
}

/// Pose provider returning fixed landmarks
#[derive(Debug, Default)]
pub struct MockPoseProvider {
    landmarks: Option<LandmarkSet>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockPoseProvider {
    /// Provider that detects `landmarks` (or nobody) in every image
    #[must_use]
    pub fn new(landmarks: Option<LandmarkSet>) -> Self {
        Self {
            landmarks,
            ..Self::default()
        }
    }

    /// Provider returning a centered upright torso
    #[must_use]
    pub fn upright_torso() -> Self {
        Self::new(Some(Self::torso_landmarks()))
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shoulders at 30% height, hips at 65%, torso spanning the middle 40%
    #[must_use]
    pub fn torso_landmarks() -> LandmarkSet {
        LandmarkSet::new()
            .with(BodyJoint::LeftShoulder, NormalizedPoint::new(0.7, 0.3))
            .with(BodyJoint::RightShoulder, NormalizedPoint::new(0.3, 0.3))
            .with(BodyJoint::LeftHip, NormalizedPoint::new(0.66, 0.65))
            .with(BodyJoint::RightHip, NormalizedPoint::new(0.34, 0.65))
    }
}

#[async_trait]
impl PoseProvider for MockPoseProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn detect_pose(&self, _image: &RgbaImage) -> Result<Option<LandmarkSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(MockupError::provider_error("mock", "Pose detection", "simulated failure"));
        }
        Ok(self.landmarks.clone())
    }
}

/// Tensor backend whose probability map is the input brightness
///
/// Lets tensor plumbing be tested end to end: bright regions of the photo come
/// back as foreground.
#[derive(Debug, Default)]
pub struct BrightnessBackend {
    spec: TensorSpec,
}

impl BrightnessBackend {
    #[must_use]
    pub fn new(spec: TensorSpec) -> Self {
        Self { spec }
    }
}

impl SegmentationBackend for BrightnessBackend {
    fn spec(&self) -> TensorSpec {
        self.spec
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = input.dim();
        if n != 1 || c != 3 {
            return Err(MockupError::processing("Expected a 1x3xHxW input tensor"));
        }

        let mut brightness = Array4::<f32>::zeros((1, 1, h, w));
        for (channel, plane) in input.axis_iter(Axis(1)).enumerate() {
            let (mean, std) = (
                self.spec.normalization_mean.get(channel).copied().unwrap_or(0.0),
                self.spec.normalization_std.get(channel).copied().unwrap_or(1.0),
            );
            let mut out = brightness.index_axis_mut(Axis(1), 0);
            out.zip_mut_with(&plane, |o, &v| *o += (v * std + mean) / 3.0);
        }
        brightness.mapv_inplace(|v| v.clamp(0.0, 1.0));
        Ok(brightness)
    }
}
