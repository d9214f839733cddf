//! Output format handling service
//!
//! Keeps encoding decisions (alpha handling, quality, container) out of the
//! compositing code.

use crate::{
    config::OutputFormat,
    error::{MockupError, Result},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageEncoder, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Service for handling output format conversions and encoding
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an RGBA image into the pixel layout the format stores
    ///
    /// JPEG has no alpha channel, so alpha is dropped.
    #[must_use]
    pub fn convert_format(rgba_image: RgbaImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Png | OutputFormat::WebP | OutputFormat::Tiff => {
                DynamicImage::ImageRgba8(rgba_image)
            },
            OutputFormat::Jpeg => DynamicImage::ImageRgba8(rgba_image).to_rgb8().into(),
        }
    }

    /// Encode an image into an in-memory file of the given format
    ///
    /// `jpeg_quality` is only used for JPEG output.
    ///
    /// # Errors
    /// - The encoder rejects the image or the format is not compiled in
    pub fn encode(image: &RgbaImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        let converted = Self::convert_format(image.clone(), format);

        let result = match format {
            OutputFormat::Jpeg => {
                let rgb = converted.to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.min(100)).write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
            },
            _ => converted.write_to(&mut buffer, Self::image_format(format)),
        };

        result.map_err(|e| {
            MockupError::processing_stage_error(
                "encode",
                &format!("Failed to encode as {format}: {e}"),
                Some(&format!("{}x{}", image.width(), image.height())),
            )
        })?;

        Ok(buffer.into_inner())
    }

    /// The `image` crate format for an output format
    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Tiff => ImageFormat::Tiff,
        }
    }

    /// Get the file extension for a given output format (without the dot)
    ///
    /// # Examples
    /// ```rust
    /// use garment_mockup::{services::OutputFormatHandler, config::OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// Infer the output format from a path's extension
    #[must_use]
    pub fn format_for_path<P: AsRef<Path>>(path: P) -> Option<OutputFormat> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }

    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        !matches!(format, OutputFormat::Jpeg)
    }

    /// Warn when transparent pixels would be flattened by the chosen format
    pub fn validate_for_image(image: &RgbaImage, format: OutputFormat) {
        if !Self::supports_transparency(format) && image.pixels().any(|p| p[3] < 255) {
            log::warn!(
                "Output format {} does not support transparency; transparent regions will be flattened",
                format
            );
        }
    }
}
