//! Interactive mockup session
//!
//! A [`MockupSession`] owns everything the pipeline needs between user
//! actions: the working canvas for the selected photo, the cached analysis,
//! the garment controls and the design overlay.
//!
//! Selecting a photo is split in three steps so the caller controls where the
//! await happens:
//!
//! 1. [`MockupSession::begin_selection`] issues a new [`SelectionId`] and
//!    returns a [`PendingAnalysis`].
//! 2. [`PendingAnalysis::run`] awaits the segmentation and pose providers
//!    without borrowing the session.
//! 3. [`MockupSession::apply_analysis`] installs the result, unless a newer
//!    selection was issued in the meantime, in which case the outcome is
//!    discarded as [`SelectionStatus::Superseded`].
//!
//! Any failure while applying leaves the previous working canvas in place.

use crate::{
    colorize::{BlendMode, Colorizer, ShirtStyle},
    compositor::Compositor,
    config::MockupConfig,
    error::{MockupError, Result},
    garment::{GarmentMask, GarmentMaskBuilder},
    overlay::OverlayModel,
    pose::LandmarkSet,
    providers::{PoseProvider, SegmentationProvider},
    services::ImageIOService,
    types::{Mask, RgbColor},
    utils::ControlValidator,
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Identity of one photo selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionId(u64);

impl SelectionId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SelectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether an analysis outcome was installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStatus {
    Applied,
    /// A newer selection was issued; the outcome was dropped
    Superseded,
}

/// Wall-clock durations of the last selection, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisTimings {
    pub analysis_ms: u64,
    pub mask_ms: u64,
    pub colorize_ms: u64,
}

/// Raw provider output for one photo
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub segmentation: Mask,
    pub landmarks: Option<LandmarkSet>,
}

/// Provider work for one selection, detached from the session
pub struct PendingAnalysis {
    selection: SelectionId,
    photo: Arc<RgbaImage>,
    segmentation: Arc<dyn SegmentationProvider>,
    pose: Arc<dyn PoseProvider>,
}

impl PendingAnalysis {
    #[must_use]
    pub fn selection(&self) -> SelectionId {
        self.selection
    }

    /// The fitted working-canvas photo being analysed
    #[must_use]
    pub fn photo(&self) -> &RgbaImage {
        &self.photo
    }

    /// Await both providers
    ///
    /// Provider errors are carried in the outcome rather than returned, so
    /// [`MockupSession::apply_analysis`] can still discard stale failures.
    #[instrument(skip(self), fields(selection = %self.selection))]
    pub async fn run(self) -> AnalysisOutcome {
        let start = Instant::now();
        let (segmentation, landmarks) = futures::join!(
            self.segmentation.segment(&self.photo),
            self.pose.detect_pose(&self.photo)
        );

        let result = match (segmentation, landmarks) {
            (Ok(segmentation), Ok(landmarks)) => Ok(AnalysisResult {
                segmentation,
                landmarks,
            }),
            (Err(e), _) | (_, Err(e)) => Err(e),
        };

        AnalysisOutcome {
            selection: self.selection,
            photo: self.photo,
            result,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Finished provider work for one selection
pub struct AnalysisOutcome {
    selection: SelectionId,
    photo: Arc<RgbaImage>,
    result: Result<AnalysisResult>,
    elapsed_ms: u64,
}

impl AnalysisOutcome {
    #[must_use]
    pub fn selection(&self) -> SelectionId {
        self.selection
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Installed state for the selected photo
struct WorkingCanvas {
    selection: SelectionId,
    photo: Arc<RgbaImage>,
    analysis: AnalysisResult,
    garment: GarmentMask,
    render: RgbaImage,
}

/// Pipeline state between user actions
pub struct MockupSession {
    config: MockupConfig,
    segmentation: Arc<dyn SegmentationProvider>,
    pose: Arc<dyn PoseProvider>,
    last_issued: u64,
    working: Option<WorkingCanvas>,
    overlay: OverlayModel,
    timings: AnalysisTimings,
}

impl MockupSession {
    /// Create a session with no photo selected
    ///
    /// # Errors
    /// - `config` fails validation
    pub fn new(
        config: MockupConfig,
        segmentation: Arc<dyn SegmentationProvider>,
        pose: Arc<dyn PoseProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let overlay = OverlayModel::new((0, 0)).with_fit_divisor(config.design_fit_divisor)?;
        Ok(Self {
            config,
            segmentation,
            pose,
            last_issued: 0,
            working: None,
            overlay,
            timings: AnalysisTimings::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &MockupConfig {
        &self.config
    }

    /// The most recently issued selection
    #[must_use]
    pub fn current_selection(&self) -> Option<SelectionId> {
        (self.last_issued > 0).then_some(SelectionId(self.last_issued))
    }

    /// The selection whose analysis is currently installed
    #[must_use]
    pub fn applied_selection(&self) -> Option<SelectionId> {
        self.working.as_ref().map(|w| w.selection)
    }

    /// Start analysing a new photo, superseding any in-flight selection
    ///
    /// The photo is downscaled to the configured maximum working width.
    pub fn begin_selection(&mut self, photo: &DynamicImage) -> PendingAnalysis {
        self.last_issued += 1;
        let selection = SelectionId(self.last_issued);
        let fitted = ImageIOService::fit_to_width(photo, self.config.max_canvas_width);
        debug!(
            "Selection {} issued for {}x{} working canvas",
            selection,
            fitted.width(),
            fitted.height()
        );

        PendingAnalysis {
            selection,
            photo: Arc::new(fitted),
            segmentation: Arc::clone(&self.segmentation),
            pose: Arc::clone(&self.pose),
        }
    }

    /// Install an analysis outcome
    ///
    /// Outcomes for superseded selections are discarded without touching
    /// state. A new working canvas clears the design overlay.
    ///
    /// # Errors
    /// - The providers failed
    /// - Mask building or colorizing failed
    ///
    /// On error the previous working canvas is kept.
    #[instrument(skip(self, outcome), fields(selection = %outcome.selection))]
    pub fn apply_analysis(&mut self, outcome: AnalysisOutcome) -> Result<SelectionStatus> {
        if self.current_selection() != Some(outcome.selection) {
            debug!("Discarding stale analysis for selection {}", outcome.selection);
            return Ok(SelectionStatus::Superseded);
        }

        let mut analysis = match outcome.result {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Analysis failed, keeping previous canvas: {}", e);
                return Err(e);
            },
        };

        let (width, height) = outcome.photo.dimensions();
        if analysis.segmentation.dimensions() != (width, height) {
            analysis.segmentation = analysis.segmentation.resize(width, height)?;
        }

        let mask_start = Instant::now();
        let garment = GarmentMaskBuilder::build(
            &analysis.segmentation,
            analysis.landmarks.as_ref(),
            self.config.mask_blur_radius,
        )?;
        let mask_ms = mask_start.elapsed().as_millis() as u64;

        let colorize_start = Instant::now();
        let render = Colorizer::apply_style(&outcome.photo, garment.mask(), &self.config.shirt)?;
        let colorize_ms = colorize_start.elapsed().as_millis() as u64;

        let overlay = OverlayModel::new((width, height)).with_fit_divisor(self.config.design_fit_divisor)?;

        info!(
            "Applied selection {} ({}x{}, torso polygon: {})",
            outcome.selection,
            width,
            height,
            garment.torso_applied()
        );
        self.working = Some(WorkingCanvas {
            selection: outcome.selection,
            photo: outcome.photo,
            analysis,
            garment,
            render,
        });
        self.overlay = overlay;
        self.timings = AnalysisTimings {
            analysis_ms: outcome.elapsed_ms,
            mask_ms,
            colorize_ms,
        };

        Ok(SelectionStatus::Applied)
    }

    /// Select a photo and wait for its analysis
    ///
    /// # Errors
    /// - See [`MockupSession::apply_analysis`]
    pub async fn select_photo(&mut self, photo: &DynamicImage) -> Result<SelectionStatus> {
        let pending = self.begin_selection(photo);
        let outcome = pending.run().await;
        self.apply_analysis(outcome)
    }

    /// Decode an uploaded photo and select it
    ///
    /// # Errors
    /// - The bytes are not a decodable image (no selection is issued)
    /// - See [`MockupSession::apply_analysis`]
    pub async fn select_photo_bytes(&mut self, bytes: &[u8]) -> Result<SelectionStatus> {
        let photo = ImageIOService::load_from_bytes(bytes)?;
        self.select_photo(&photo).await
    }

    #[must_use]
    pub fn shirt_style(&self) -> ShirtStyle {
        self.config.shirt
    }

    /// # Errors
    /// - Recolorizing fails; the previous color is kept
    pub fn set_shirt_color(&mut self, color: RgbColor) -> Result<()> {
        self.set_shirt_style(ShirtStyle {
            color,
            ..self.config.shirt
        })
    }

    /// # Errors
    /// - `opacity` lies outside `[0, 1]`
    pub fn set_shirt_opacity(&mut self, opacity: f32) -> Result<()> {
        self.set_shirt_style(ShirtStyle {
            opacity,
            ..self.config.shirt
        })
    }

    /// # Errors
    /// - Recolorizing fails; the previous mode is kept
    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) -> Result<()> {
        self.set_shirt_style(ShirtStyle {
            blend_mode,
            ..self.config.shirt
        })
    }

    /// Replace all garment color controls and recolorize
    ///
    /// # Errors
    /// - Opacity lies outside `[0, 1]`
    /// - Recolorizing fails
    pub fn set_shirt_style(&mut self, style: ShirtStyle) -> Result<()> {
        ControlValidator::validate_unit_interval(style.opacity, "Shirt opacity")?;
        if let Some(working) = self.working.as_mut() {
            let start = Instant::now();
            working.render = Colorizer::apply_style(&working.photo, working.garment.mask(), &style)?;
            self.timings.colorize_ms = start.elapsed().as_millis() as u64;
        }
        self.config.shirt = style;
        Ok(())
    }

    #[must_use]
    pub fn blur_radius(&self) -> f32 {
        self.config.mask_blur_radius
    }

    /// Rebuild the garment mask with a new blur radius
    ///
    /// Reuses the cached provider output of the current photo.
    ///
    /// # Errors
    /// - `radius` is negative or not finite
    /// - Rebuilding fails; the previous mask and render are kept
    pub fn set_blur_radius(&mut self, radius: f32) -> Result<()> {
        let radius = ControlValidator::validate_non_negative(radius, "Mask blur radius")?;
        if let Some(working) = self.working.as_mut() {
            let mask_start = Instant::now();
            let garment = GarmentMaskBuilder::build(
                &working.analysis.segmentation,
                working.analysis.landmarks.as_ref(),
                radius,
            )?;
            let mask_ms = mask_start.elapsed().as_millis() as u64;

            let colorize_start = Instant::now();
            let render = Colorizer::apply_style(&working.photo, garment.mask(), &self.config.shirt)?;
            self.timings.colorize_ms = colorize_start.elapsed().as_millis() as u64;
            self.timings.mask_ms = mask_ms;

            working.garment = garment;
            working.render = render;
        }
        self.config.mask_blur_radius = radius;
        Ok(())
    }

    /// Place a design on the current working canvas
    ///
    /// # Errors
    /// - No photo has been applied yet
    /// - The design has a zero dimension
    pub fn load_design(&mut self, design: &DynamicImage) -> Result<()> {
        if self.working.is_none() {
            return Err(MockupError::NoBaseImage);
        }
        self.overlay.load(design.to_rgba8())
    }

    /// Decode an uploaded design and place it
    ///
    /// # Errors
    /// - The bytes are not a decodable image; the current overlay is kept
    /// - See [`MockupSession::load_design`]
    pub fn load_design_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let design = ImageIOService::load_from_bytes(bytes)?;
        self.load_design(&design)
    }

    #[must_use]
    pub fn overlay(&self) -> &OverlayModel {
        &self.overlay
    }

    /// Overlay controls (scale, rotation, opacity, position, reset)
    pub fn overlay_mut(&mut self) -> &mut OverlayModel {
        &mut self.overlay
    }

    /// The working photo with the colorized garment, without the design
    #[must_use]
    pub fn render_target(&self) -> Option<&RgbaImage> {
        self.working.as_ref().map(|w| &w.render)
    }

    /// The fitted photo the current render is built on
    #[must_use]
    pub fn working_photo(&self) -> Option<&RgbaImage> {
        self.working.as_ref().map(|w| w.photo.as_ref())
    }

    #[must_use]
    pub fn garment_mask(&self) -> Option<&GarmentMask> {
        self.working.as_ref().map(|w| &w.garment)
    }

    #[must_use]
    pub fn landmarks(&self) -> Option<&LandmarkSet> {
        self.working.as_ref().and_then(|w| w.analysis.landmarks.as_ref())
    }

    #[must_use]
    pub fn timings(&self) -> AnalysisTimings {
        self.timings
    }

    /// Flatten render target and overlay
    ///
    /// # Errors
    /// - No photo has been applied
    pub fn flatten(&self) -> Result<RgbaImage> {
        Compositor::flatten(self.render_target(), &self.overlay)
    }

    /// Flatten and encode in the configured output format
    ///
    /// # Errors
    /// - No photo has been applied
    /// - Encoding fails
    pub async fn export(&self) -> Result<Vec<u8>> {
        let flat = self.flatten()?;
        Compositor::encode(flat, self.config.output_format, self.config.jpeg_quality).await
    }

    /// Flatten, encode and write the mockup
    ///
    /// A directory target receives the configured export file name. The file
    /// is always encoded in the configured output format, whatever its
    /// extension.
    ///
    /// # Errors
    /// - No photo has been applied; nothing is written
    /// - Encoding or writing fails
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn export_to_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let flat = self.flatten()?;

        let path = path.as_ref();
        let target = if path.is_dir() {
            path.join(&self.config.export_file_name)
        } else {
            path.to_path_buf()
        };
        Compositor::save(flat, target, self.config.output_format, self.config.jpeg_quality).await
    }

    /// Write the refined garment mask as a grayscale PNG
    ///
    /// # Errors
    /// - No photo has been applied
    /// - Writing fails
    pub fn save_mask<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let garment = self.garment_mask().ok_or(MockupError::NoBaseImage)?;
        garment.mask().save_png(path)
    }
}
