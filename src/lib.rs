#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Garment Mockup
//!
//! Recolors the T-shirt worn by a person in a photo and lays a user design
//! over it, producing a flattened PNG mockup.
//!
//! The pipeline:
//!
//! 1. A [`SegmentationProvider`] yields a person mask and a [`PoseProvider`]
//!    yields body landmarks (both are pluggable; the models themselves are
//!    external).
//! 2. [`GarmentMaskBuilder`] intersects the person mask with the torso
//!    polygon from the landmarks and feathers the edge with a Gaussian blur.
//! 3. [`Colorizer`] blends a flat shirt color into the masked region using a
//!    W3C blend mode at a given opacity.
//! 4. [`OverlayModel`] places a design (scale, rotation, opacity, position)
//!    and [`Compositor`] flattens everything for export.
//!
//! [`MockupSession`] ties these together for interactive use and discards
//! analysis results that belong to a photo the user already moved away from.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use garment_mockup::{
//!     providers::{LandmarkFileProvider, MaskImageProvider},
//!     BlendMode, MockupConfig, MockupSession, RgbColor,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MockupConfig::builder()
//!     .shirt_color("#1e90ff".parse::<RgbColor>()?)
//!     .blend_mode(BlendMode::Multiply)
//!     .shirt_opacity(0.8)
//!     .build()?;
//!
//! let mut session = MockupSession::new(
//!     config,
//!     Arc::new(MaskImageProvider::new("person-mask.png")),
//!     Arc::new(LandmarkFileProvider::new("pose.json")),
//! )?;
//!
//! session.select_photo(&image::open("model.jpg")?).await?;
//! session.load_design(&image::open("logo.png")?)?;
//! session.overlay_mut().set_rotation(-10.0)?;
//! session.export_to_path(".").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `webp-support` (default): WebP decoding and encoding
//! - `tracing-json`: JSON log output for the CLI

#[cfg(feature = "cli")]
pub mod cli;
pub mod colorize;
pub mod compositor;
pub mod config;
pub mod error;
pub mod gallery;
pub mod garment;
pub mod overlay;
pub mod pose;
pub mod providers;
pub mod services;
pub mod session;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;

pub use colorize::{BlendMode, Colorizer, ShirtStyle};
pub use compositor::Compositor;
pub use config::{MockupConfig, MockupConfigBuilder, OutputFormat};
pub use error::{MockupError, Result};
pub use gallery::{Gallery, GalleryEntry};
pub use garment::{GarmentMask, GarmentMaskBuilder};
pub use overlay::{Affine, OverlayModel, OverlayTransform, PlacedOverlay};
pub use pose::{BodyJoint, LandmarkSet, NormalizedPoint, Polygon};
pub use providers::{NoPoseProvider, PoseProvider, SegmentationProvider};
pub use services::{ImageIOService, OutputFormatHandler};
pub use session::{AnalysisOutcome, MockupSession, PendingAnalysis, SelectionId, SelectionStatus};
pub use types::{Mask, MaskStatistics, RgbColor};
pub use utils::ControlValidator;

#[cfg(feature = "cli")]
pub use tracing_config::{events, init_cli_tracing, spans, TracingConfig, TracingFormat};

/// Render a mockup in one call
///
/// Runs the full pipeline on `photo` and, when given, places `design` at its
/// default position. The result is the flattened working canvas, i.e. the
/// photo downscaled to the configured maximum width.
///
/// # Examples
///
/// ```rust,no_run
/// use garment_mockup::{
///     providers::{MockSegmentationProvider, MockShape},
///     render_mockup, MockupConfig, NoPoseProvider,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let photo = image::open("model.jpg")?;
/// let mockup = render_mockup(
///     &photo,
///     None,
///     MockupConfig::default(),
///     Arc::new(MockSegmentationProvider::new(MockShape::Ellipse)),
///     Arc::new(NoPoseProvider),
/// )
/// .await?;
/// mockup.save("tshirt-mockup.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn render_mockup(
    photo: &image::DynamicImage,
    design: Option<&image::DynamicImage>,
    config: MockupConfig,
    segmentation: Arc<dyn SegmentationProvider>,
    pose: Arc<dyn PoseProvider>,
) -> Result<image::RgbaImage> {
    let mut session = MockupSession::new(config, segmentation, pose)?;
    session.select_photo(photo).await?;
    if let Some(design) = design {
        session.load_design(design)?;
    }
    session.flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockSegmentationProvider, MockShape};
    use image::{DynamicImage, Rgba, RgbaImage};

    #[tokio::test]
    async fn test_render_mockup_without_design() {
        let photo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 30, Rgba([100, 150, 200, 255])));
        let config = MockupConfig::builder()
            .mask_blur_radius(0.0)
            .shirt_opacity(0.5)
            .build()
            .unwrap();

        let mockup = render_mockup(
            &photo,
            None,
            config,
            Arc::new(MockSegmentationProvider::new(MockShape::Full)),
            Arc::new(NoPoseProvider),
        )
        .await
        .unwrap();
        assert_eq!(mockup.dimensions(), (20, 30));
        assert_eq!(mockup.get_pixel(10, 15), &Rgba([100, 75, 100, 255]));
    }
}
