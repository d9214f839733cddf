//! Image I/O operations service
//!
//! File and byte-level image loading and saving, kept apart from the pixel
//! pipeline so the compositing code never touches the filesystem.

use crate::{
    config::OutputFormat,
    error::{MockupError, Result},
    services::OutputFormatHandler,
};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content sniffing when the extension is missing or wrong.
    ///
    /// # Errors
    /// - The file does not exist or cannot be read
    /// - The content is not a decodable raster image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use garment_mockup::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("models/model1.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(MockupError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref)
                    .map_err(|io_err| MockupError::file_io_error("read image data", path_ref, &io_err))?;

                image::load_from_memory(&data).map_err(|content_err| {
                    MockupError::decode(format!(
                        "{} ({} bytes) is not a decodable image: {}",
                        path_ref.display(),
                        data.len(),
                        content_err
                    ))
                })
            },
        }
    }

    /// Decode an image from bytes
    ///
    /// # Errors
    /// - The bytes are not a decodable raster image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(MockupError::decode("Image data is empty"));
        }
        image::load_from_memory(bytes)
            .map_err(|e| MockupError::decode(format!("Failed to decode image from bytes: {e}")))
    }

    /// Read all bytes from an async reader and decode them
    ///
    /// # Errors
    /// - Reading from the stream fails
    /// - The bytes are not a decodable raster image
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::load_from_bytes(&buffer)
    }

    /// Encode and write an image, replacing `path` atomically
    ///
    /// The encoded file is written to a temporary file next to the target and
    /// renamed into place, so a failed export never leaves a partial file.
    ///
    /// # Errors
    /// - Encoding fails
    /// - The output directory cannot be created or written
    pub fn save_image<P: AsRef<Path>>(
        image: &RgbaImage,
        path: P,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<PathBuf> {
        let path_ref = path.as_ref();
        OutputFormatHandler::validate_for_image(image, format);
        let bytes = OutputFormatHandler::encode(image, format, jpeg_quality)?;
        Self::write_atomic(path_ref, &bytes)?;
        log::info!("Wrote {} ({} bytes)", path_ref.display(), bytes.len());
        Ok(path_ref.to_path_buf())
    }

    /// Write bytes to `path` through a temporary sibling file
    ///
    /// # Errors
    /// - The parent directory cannot be created
    /// - Writing or renaming the temporary file fails
    pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .map_err(|e| MockupError::file_io_error("create output directory", parent, &e))?;

        let mut file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| MockupError::file_io_error("create temporary file in", parent, &e))?;
        file.write_all(bytes)
            .map_err(|e| MockupError::file_io_error("write", path, &e))?;
        file.persist(path)
            .map_err(|e| MockupError::file_io_error("persist", path, &e.error))?;
        Ok(())
    }

    /// Downscale an image to at most `max_width` pixels wide
    ///
    /// Aspect ratio is preserved and images are never upscaled.
    #[must_use]
    pub fn fit_to_width(image: &DynamicImage, max_width: u32) -> RgbaImage {
        let (width, height) = (image.width(), image.height());
        if width <= max_width || max_width == 0 {
            return image.to_rgba8();
        }

        let scale = f64::from(max_width) / f64::from(width);
        let new_height = ((f64::from(height) * scale).round() as u32).max(1);
        log::debug!("Fitting {}x{} photo to {}x{}", width, height, max_width, new_height);
        image
            .resize_exact(max_width, new_height, FilterType::Triangle)
            .to_rgba8()
    }

    /// Check if a file path has a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif" | "bmp" | "gif"
                )
            })
    }
}
