//! Garment mockup CLI
//!
//! Renders a single mockup from a model photo, a precomputed segmentation
//! mask, optional pose landmarks and an optional design.

use super::config::CliConfigBuilder;
use crate::{
    gallery::Gallery,
    providers::{LandmarkFileProvider, MaskImageProvider, NoPoseProvider, PoseProvider, SegmentationProvider},
    services::ImageIOService,
    session::{MockupSession, SelectionStatus},
    tracing_config::{events, init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

/// Garment mockup CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "garment-mockup")]
pub struct Cli {
    /// Model photo [default: first entry of the gallery]
    #[arg(value_name = "PHOTO")]
    pub photo: Option<PathBuf>,

    /// Person segmentation mask image (white = person, or alpha cut-out)
    #[arg(short, long, value_name = "MASK", required_unless_present = "list_gallery")]
    pub mask: Option<PathBuf>,

    /// Pose landmark JSON; without it the mask is not limited to the torso
    #[arg(short, long, value_name = "JSON")]
    pub pose: Option<PathBuf>,

    /// Design image to place on the shirt
    #[arg(short, long, value_name = "IMAGE")]
    pub design: Option<PathBuf>,

    /// Design scale relative to its natural size
    #[arg(long, requires = "design")]
    pub design_scale: Option<f32>,

    /// Design rotation in degrees (clockwise)
    #[arg(long, requires = "design", allow_negative_numbers = true)]
    pub design_rotation: Option<f32>,

    /// Design opacity (0-1)
    #[arg(long, requires = "design")]
    pub design_opacity: Option<f32>,

    /// Design center x on the working canvas [default: canvas center]
    #[arg(long, requires = "design", allow_negative_numbers = true)]
    pub design_x: Option<f32>,

    /// Design center y on the working canvas [default: canvas center]
    #[arg(long, requires = "design", allow_negative_numbers = true)]
    pub design_y: Option<f32>,

    /// Shirt color as #rrggbb or #rgb
    #[arg(short, long)]
    pub color: Option<String>,

    /// Shirt color opacity (0-1)
    #[arg(long)]
    pub opacity: Option<f32>,

    /// Blend mode (normal, multiply, screen, overlay, darken, lighten,
    /// color-dodge, color-burn, hard-light, soft-light, difference, exclusion)
    #[arg(short, long)]
    pub blend_mode: Option<String>,

    /// Mask edge blur radius in pixels
    #[arg(long)]
    pub blur: Option<f32>,

    /// Maximum working canvas width in pixels
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Output file or directory. Use "-" for stdout [default: tshirt-mockup.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: from --config, else the output extension, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Also write the refined garment mask as a grayscale PNG
    #[arg(long, value_name = "PATH")]
    pub mask_out: Option<PathBuf>,

    /// Gallery directory containing models.json
    #[arg(long, value_name = "DIR", default_value = "models")]
    pub gallery: PathBuf,

    /// List gallery entries and exit
    #[arg(long)]
    pub list_gallery: bool,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
    Tiff,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;
    debug!(verbosity = cli.verbose, "Tracing initialized");

    if cli.list_gallery {
        list_gallery(&cli.gallery);
        return Ok(());
    }

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    let photo_path = resolve_photo(&cli)?;
    let mask_path = cli
        .mask
        .clone()
        .context("A segmentation mask is required (--mask)")?;

    let segmentation: Arc<dyn SegmentationProvider> = Arc::new(MaskImageProvider::new(mask_path));
    let pose: Arc<dyn PoseProvider> = match &cli.pose {
        Some(path) => Arc::new(LandmarkFileProvider::new(path)),
        None => Arc::new(NoPoseProvider),
    };

    let span = spans::session(&session_id, segmentation.name(), pose.name());
    let session = MockupSession::new(config, segmentation, pose).context("Failed to create mockup session")?;

    run_session(session, &cli, &photo_path).instrument(span).await
}

async fn run_session(mut session: MockupSession, cli: &Cli, photo_path: &Path) -> Result<()> {
    let photo = ImageIOService::load_image(photo_path)
        .with_context(|| format!("Failed to load photo: {}", photo_path.display()))?;

    let spinner = create_spinner("Analysing photo")?;
    let status = session
        .select_photo(&photo)
        .instrument(spans::selection(photo_path, (photo.width(), photo.height())))
        .await;
    spinner.finish_and_clear();
    if status.context("Failed to analyse photo")? != SelectionStatus::Applied {
        anyhow::bail!("Photo selection was superseded");
    }
    report_selection(&session, photo_path);

    if let Some(design_path) = &cli.design {
        place_design(&mut session, cli, design_path)?;
    }

    write_output(&session, cli.output.as_deref()).await?;

    if let Some(mask_out) = &cli.mask_out {
        session
            .save_mask(mask_out)
            .with_context(|| format!("Failed to write mask: {}", mask_out.display()))?;
        info!("Garment mask written to {}", mask_out.display());
    }

    Ok(())
}

fn list_gallery(dir: &Path) {
    let gallery = Gallery::load(dir);
    if gallery.is_empty() {
        println!("No gallery entries found in {}", dir.display());
        return;
    }

    println!("Gallery {} ({} entries):", dir.display(), gallery.len());
    for (index, entry) in gallery.entries().iter().enumerate() {
        println!("  {index:>3}  {:<30} {}", entry.title, entry.path.display());
    }
}

/// The explicit photo, or the first gallery entry
fn resolve_photo(cli: &Cli) -> Result<PathBuf> {
    if let Some(photo) = &cli.photo {
        return Ok(photo.clone());
    }

    let mut gallery = Gallery::load(&cli.gallery);
    let entry = gallery.select_first().with_context(|| {
        format!(
            "No photo given and the gallery at {} is empty",
            cli.gallery.display()
        )
    })?;
    info!("Using gallery photo {}", entry.title);
    Ok(entry.path.clone())
}

fn create_spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid spinner template")?,
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn report_selection(session: &MockupSession, photo_path: &Path) {
    let timings = session.timings();
    events::performance_metric("analysis", timings.analysis_ms);
    events::performance_metric("mask_build", timings.mask_ms);
    events::performance_metric("colorize", timings.colorize_ms);

    info!("Processed {}:", photo_path.display());
    if let Some(garment) = session.garment_mask() {
        let stats = garment.mask().statistics();
        let (width, height) = garment.dimensions();
        info!("  ├─ Working canvas: {}x{}", width, height);
        info!("  ├─ Garment coverage: {:.1}%", stats.coverage_ratio * 100.0);
        if !garment.torso_applied() {
            events::warning_with_recommendation(
                "No torso landmarks, mask covers the whole person",
                "pass --pose to limit the color to the shirt",
            );
        }
    }
    info!("  ├─ Analysis: {}ms", timings.analysis_ms);
    info!("  ├─ Mask: {}ms", timings.mask_ms);
    info!("  └─ Colorize: {}ms", timings.colorize_ms);
}

fn place_design(session: &mut MockupSession, cli: &Cli, design_path: &Path) -> Result<()> {
    let design = ImageIOService::load_image(design_path)
        .with_context(|| format!("Failed to load design: {}", design_path.display()))?;
    session.load_design(&design).context("Failed to place design")?;

    let overlay = session.overlay_mut();
    if let Some(scale) = cli.design_scale {
        overlay.set_scale(scale).context("Invalid design scale")?;
    }
    if let Some(rotation) = cli.design_rotation {
        overlay.set_rotation(rotation).context("Invalid design rotation")?;
    }
    if let Some(opacity) = cli.design_opacity {
        overlay.set_opacity(opacity).context("Invalid design opacity")?;
    }
    if cli.design_x.is_some() || cli.design_y.is_some() {
        let (x, y) = overlay
            .transform()
            .map(|t| t.position)
            .context("Design was not placed")?;
        overlay
            .set_position(cli.design_x.unwrap_or(x), cli.design_y.unwrap_or(y))
            .context("Invalid design position")?;
    }

    if let Some(transform) = overlay.transform() {
        debug!(?transform, "Design placed");
    }
    Ok(())
}

async fn write_output(session: &MockupSession, output: Option<&str>) -> Result<()> {
    if output == Some("-") {
        let bytes = session.export().await.context("Failed to export mockup")?;
        return write_stdout(&bytes);
    }

    let target = output.map_or_else(|| PathBuf::from(&session.config().export_file_name), PathBuf::from);
    if target.is_file() {
        warn!("Overwriting {}", target.display());
    }
    let format = session.config().output_format.to_string();
    let written = session
        .export_to_path(&target)
        .instrument(spans::export(&target, &format))
        .await
        .context("Failed to export mockup")?;
    events::progress(&format!("Mockup written to {}", written.display()));
    Ok(())
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(data).context("Failed to write to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
