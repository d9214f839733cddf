//! Core pixel types shared by the mockup pipeline

use crate::error::{MockupError, Result};
use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Single-channel coverage mask with values in `[0, 1]`
///
/// Used both for the raw segmentation output and for the refined garment mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Vec<f32>,
    dimensions: (u32, u32),
}

impl Mask {
    /// Create a mask from row-major coverage values
    ///
    /// Values are clamped into `[0, 1]`; non-finite values become 0.
    ///
    /// # Errors
    /// - `data.len()` does not equal `width * height`
    pub fn new(data: Vec<f32>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(MockupError::processing(format!(
                "Mask data length {} does not match {}x{}",
                data.len(),
                dimensions.0,
                dimensions.1
            )));
        }

        let data = data
            .into_iter()
            .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
            .collect();

        Ok(Self { data, dimensions })
    }

    /// Create a mask where every pixel has the same coverage
    #[must_use]
    pub fn filled(dimensions: (u32, u32), value: f32) -> Self {
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            data: vec![value; dimensions.0 as usize * dimensions.1 as usize],
            dimensions,
        }
    }

    /// Create a mask from an 8-bit grayscale image (255 = full coverage)
    #[must_use]
    pub fn from_luma(image: &GrayImage) -> Self {
        let data = image.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect();
        Self {
            data,
            dimensions: image.dimensions(),
        }
    }

    /// Convert the mask to an 8-bit grayscale image
    #[must_use]
    pub fn to_luma(&self) -> GrayImage {
        let (width, height) = self.dimensions;
        ImageBuffer::from_fn(width, height, |x, y| {
            Luma([(self.get(x, y) * 255.0).round() as u8])
        })
    }

    /// Raw row-major coverage values
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mask dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Coverage at a pixel, 0 outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return 0.0;
        }
        let index = y as usize * self.dimensions.0 as usize + x as usize;
        self.data.get(index).copied().unwrap_or(0.0)
    }

    /// Resample the mask to new dimensions with a triangle filter
    ///
    /// # Errors
    /// - Target dimensions are zero
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<Mask> {
        if new_width == 0 || new_height == 0 {
            return Err(MockupError::processing("Cannot resize mask to zero size"));
        }
        if (new_width, new_height) == self.dimensions {
            return Ok(self.clone());
        }

        let (width, height) = self.dimensions;
        let source: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(width, height, self.data.clone())
                .ok_or_else(|| MockupError::processing("Failed to view mask as image"))?;
        let resized = image::imageops::resize(
            &source,
            new_width,
            new_height,
            image::imageops::FilterType::Triangle,
        );

        Mask::new(resized.into_raw(), (new_width, new_height))
    }

    /// Per-pixel product with another mask of the same size
    ///
    /// # Errors
    /// - The masks have different dimensions
    pub fn intersect(&self, other: &Mask) -> Result<Mask> {
        if self.dimensions != other.dimensions {
            return Err(MockupError::dimension_mismatch(
                self.dimensions,
                other.dimensions,
            ));
        }

        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .collect();

        Ok(Self {
            data,
            dimensions: self.dimensions,
        })
    }

    /// Get mask coverage statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let covered_pixels = self.data.iter().filter(|&&v| v > 0.5).count();
        let partial_pixels = self
            .data
            .iter()
            .filter(|&&v| v > 0.0 && v < 1.0)
            .count();
        let coverage_ratio = if total_pixels == 0 {
            0.0
        } else {
            covered_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            covered_pixels,
            partial_pixels,
            coverage_ratio,
        }
    }

    /// Save mask as grayscale PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_luma()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about a mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    /// Pixels with coverage above one half
    pub covered_pixels: usize,
    /// Pixels strictly between 0 and 1 (feathered edge)
    pub partial_pixels: usize,
    pub coverage_ratio: f32,
}

/// Opaque sRGB color, parsed from CSS hex notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels normalized to `[0, 1]`
    #[must_use]
    pub fn to_unit(self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

impl Default for RgbColor {
    fn default() -> Self {
        // #ff0000
        Self::new(255, 0, 0)
    }
}

impl FromStr for RgbColor {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || MockupError::invalid_config(format!("Invalid color '{s}', expected #rrggbb or #rgb"));

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        match hex.len() {
            6 => {
                let channel = |range: std::ops::Range<usize>| {
                    hex.get(range)
                        .and_then(|part| u8::from_str_radix(part, 16).ok())
                        .ok_or_else(invalid)
                };
                Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
            },
            3 => {
                // #rgb expands each digit to a doubled pair
                let digits: Vec<u8> = hex
                    .chars()
                    .filter_map(|c| c.to_digit(16))
                    .map(|d| (d * 17) as u8)
                    .collect();
                match digits.as_slice() {
                    [r, g, b] => Ok(Self::new(*r, *g, *b)),
                    _ => Err(invalid()),
                }
            },
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for RgbColor {
    type Error = MockupError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        color.to_string()
    }
}

impl std::fmt::Display for RgbColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
