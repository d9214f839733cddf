//! Configuration types for mockup rendering

use crate::{
    colorize::{BlendMode, ShirtStyle},
    error::{MockupError, Result},
    types::RgbColor,
    utils::ControlValidator,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default export file name
pub const DEFAULT_EXPORT_FILE_NAME: &str = "tshirt-mockup.png";

/// Default maximum working-canvas width in pixels
pub const DEFAULT_MAX_CANVAS_WIDTH: u32 = 1200;

/// Default mask blur radius in pixels
pub const DEFAULT_MASK_BLUR_RADIUS: f32 = 6.0;

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency, alpha dropped)
    Jpeg,
    /// Lossless WebP with alpha channel
    WebP,
    /// TIFF with alpha channel
    Tiff,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            "tif" | "tiff" => Ok(Self::Tiff),
            other => Err(MockupError::invalid_config(format!(
                "Unsupported output format '{other}'. Supported: png, jpeg, webp, tiff"
            ))),
        }
    }
}

/// Mockup pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockupConfig {
    /// Garment color, opacity and blend mode
    pub shirt: ShirtStyle,

    /// Gaussian standard deviation applied to the garment mask, in pixels
    pub mask_blur_radius: f32,

    /// Photos wider than this are downscaled before analysis
    pub max_canvas_width: u32,

    /// A new design initially spans at most `1 / design_fit_divisor` of the canvas
    pub design_fit_divisor: f32,

    /// Export encoding
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,

    /// File name used when exporting into a directory
    pub export_file_name: String,
}

impl Default for MockupConfig {
    fn default() -> Self {
        Self {
            shirt: ShirtStyle::default(),
            mask_blur_radius: DEFAULT_MASK_BLUR_RADIUS,
            max_canvas_width: DEFAULT_MAX_CANVAS_WIDTH,
            design_fit_divisor: crate::overlay::DEFAULT_FIT_DIVISOR,
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }
}

impl MockupConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use garment_mockup::{BlendMode, MockupConfig};
    ///
    /// let config = MockupConfig::builder()
    ///     .shirt_color("#1e90ff".parse().unwrap())
    ///     .blend_mode(BlendMode::Screen)
    ///     .mask_blur_radius(3.0)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.mask_blur_radius, 3.0);
    /// ```
    #[must_use]
    pub fn builder() -> MockupConfigBuilder {
        MockupConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON is malformed
    /// - Values fail [`MockupConfig::validate`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MockupError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Shirt opacity outside 0.0-1.0
    /// - Negative or non-finite blur radius
    /// - Zero canvas width
    /// - Non-positive design fit divisor
    /// - JPEG quality above 100
    /// - Empty export file name
    pub fn validate(&self) -> Result<()> {
        ControlValidator::validate_unit_interval(self.shirt.opacity, "shirt opacity")?;
        ControlValidator::validate_non_negative(self.mask_blur_radius, "mask blur radius")?;
        ControlValidator::validate_positive(self.design_fit_divisor, "design fit divisor")?;

        if self.max_canvas_width == 0 {
            return Err(MockupError::config_value_error(
                "max canvas width",
                self.max_canvas_width,
                "1 or more",
                Some(DEFAULT_MAX_CANVAS_WIDTH),
            ));
        }

        if self.jpeg_quality > 100 {
            return Err(MockupError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }

        if self.export_file_name.trim().is_empty() {
            return Err(MockupError::invalid_config("Export file name must not be empty"));
        }

        Ok(())
    }
}

/// Builder for `MockupConfig`
#[derive(Debug, Default)]
pub struct MockupConfigBuilder {
    config: MockupConfig,
}

impl MockupConfigBuilder {
    #[must_use]
    pub fn shirt_color(mut self, color: RgbColor) -> Self {
        self.config.shirt.color = color;
        self
    }

    #[must_use]
    pub fn shirt_opacity(mut self, opacity: f32) -> Self {
        self.config.shirt.opacity = opacity;
        self
    }

    #[must_use]
    pub fn blend_mode(mut self, mode: BlendMode) -> Self {
        self.config.shirt.blend_mode = mode;
        self
    }

    /// Set mask blur radius in pixels
    #[must_use]
    pub fn mask_blur_radius(mut self, radius: f32) -> Self {
        self.config.mask_blur_radius = radius;
        self
    }

    #[must_use]
    pub fn max_canvas_width(mut self, width: u32) -> Self {
        self.config.max_canvas_width = width;
        self
    }

    #[must_use]
    pub fn design_fit_divisor(mut self, divisor: f32) -> Self {
        self.config.design_fit_divisor = divisor;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality (clamped to 100)
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.min(100);
        self
    }

    #[must_use]
    pub fn export_file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.export_file_name = name.into();
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any parameter fails [`MockupConfig::validate`]
    pub fn build(self) -> Result<MockupConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MockupConfig::default();
        assert_eq!(config.shirt.color, RgbColor::new(255, 0, 0));
        assert_eq!(config.shirt.opacity, 1.0);
        assert_eq!(config.shirt.blend_mode, BlendMode::Multiply);
        assert_eq!(config.mask_blur_radius, 6.0);
        assert_eq!(config.max_canvas_width, 1200);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.export_file_name, "tshirt-mockup.png");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = MockupConfig::builder()
            .shirt_opacity(0.5)
            .blend_mode(BlendMode::Normal)
            .output_format(OutputFormat::Jpeg)
            .jpeg_quality(150)
            .build()
            .unwrap();

        assert_eq!(config.shirt.opacity, 0.5);
        assert_eq!(config.shirt.blend_mode, BlendMode::Normal);
        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_config_validation() {
        assert!(MockupConfig::builder().shirt_opacity(1.5).build().is_err());
        assert!(MockupConfig::builder().mask_blur_radius(-2.0).build().is_err());
        assert!(MockupConfig::builder().max_canvas_width(0).build().is_err());
        assert!(MockupConfig::builder().design_fit_divisor(0.0).build().is_err());
        assert!(MockupConfig::builder().export_file_name("  ").build().is_err());

        let mut config = MockupConfig::default();
        config.jpeg_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("tif".parse::<OutputFormat>().unwrap(), OutputFormat::Tiff);
        assert!("gif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::WebP.to_string(), "webp");
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"{{"shirt": {{"color": "#00ff00", "blend_mode": "screen"}}, "mask_blur_radius": 2.5}}"##
        )
        .unwrap();

        let config = MockupConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.shirt.color, RgbColor::new(0, 255, 0));
        assert_eq!(config.shirt.blend_mode, BlendMode::Screen);
        assert_eq!(config.shirt.opacity, 1.0);
        assert_eq!(config.mask_blur_radius, 2.5);
        assert_eq!(config.max_canvas_width, 1200);
    }

    #[test]
    fn test_invalid_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"shirt": {{"opacity": 3.0}}}}"#).unwrap();
        assert!(MockupConfig::from_json_file(file.path()).is_err());

        assert!(MockupConfig::from_json_file("/nonexistent/mockup.json").is_err());
    }
}
