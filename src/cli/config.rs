//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::{
    colorize::BlendMode,
    config::{MockupConfig, OutputFormat},
    services::OutputFormatHandler,
    types::RgbColor,
    utils::ControlValidator,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `MockupConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or defaults) and apply flag overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<MockupConfig> {
        let mut config = match &cli.config {
            Some(path) => MockupConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => MockupConfig::default(),
        };

        if let Some(color) = &cli.color {
            config.shirt.color = color.parse::<RgbColor>().context("Invalid shirt color")?;
        }
        if let Some(opacity) = cli.opacity {
            config.shirt.opacity = opacity;
        }
        if let Some(mode) = &cli.blend_mode {
            config.shirt.blend_mode = mode.parse::<BlendMode>().context("Invalid blend mode")?;
        }
        if let Some(blur) = cli.blur {
            config.mask_blur_radius = blur;
        }
        if let Some(width) = cli.max_width {
            config.max_canvas_width = width;
        }
        // --format, then the config file, then the output extension
        if let Some(format) = cli.format {
            config.output_format = Self::output_format(format);
        } else if cli.config.is_none() {
            if let Some(format) = cli
                .output
                .as_deref()
                .filter(|output| *output != "-")
                .and_then(|output| OutputFormatHandler::format_for_path(output))
            {
                config.output_format = format;
            }
        }
        if let Some(quality) = cli.jpeg_quality {
            config.jpeg_quality = quality;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn output_format(format: CliOutputFormat) -> OutputFormat {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
        }
    }

    /// Check ranges of flags that bypass the config file
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(opacity) = cli.opacity {
            ControlValidator::validate_unit_interval(opacity, "shirt opacity").context("Invalid --opacity")?;
        }
        if let Some(blur) = cli.blur {
            ControlValidator::validate_non_negative(blur, "mask blur radius").context("Invalid --blur")?;
        }
        if let Some(scale) = cli.design_scale {
            ControlValidator::validate_positive(scale, "design scale").context("Invalid --design-scale")?;
        }
        if let Some(opacity) = cli.design_opacity {
            ControlValidator::validate_unit_interval(opacity, "design opacity")
                .context("Invalid --design-opacity")?;
        }
        if let Some(quality) = cli.jpeg_quality {
            if quality > 100 {
                anyhow::bail!("JPEG quality must be 0-100, got {quality}");
            }
        }
        Ok(())
    }
}
