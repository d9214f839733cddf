//! Garment region detection and mask refinement
//!
//! The garment mask is the body segmentation clipped to the torso
//! quadrilateral spanned by the shoulders and hips, then feathered with a
//! separable Gaussian so recolored edges blend into the photo.

use crate::{
    error::Result,
    pose::{LandmarkSet, Polygon},
    types::Mask,
    utils::ControlValidator,
};
use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point};
use tracing::{debug, instrument};

/// Kernel half-width in standard deviations
const KERNEL_SIGMAS: f32 = 3.0;

/// Fraction of a Gaussian's weight within ±3σ
const TRUNCATED_GAUSSIAN_MASS: f32 = 0.997_300_2;

/// Refined garment coverage for one working canvas
#[derive(Debug, Clone, PartialEq)]
pub struct GarmentMask {
    mask: Mask,
    blur_radius: f32,
    torso_applied: bool,
}

impl GarmentMask {
    #[must_use]
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    #[must_use]
    pub fn into_mask(self) -> Mask {
        self.mask
    }

    /// Blur radius this mask was built with
    #[must_use]
    pub fn blur_radius(&self) -> f32 {
        self.blur_radius
    }

    /// False when the mask fell back to segmentation only
    #[must_use]
    pub fn torso_applied(&self) -> bool {
        self.torso_applied
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }
}

/// Builds garment masks from segmentation output and pose landmarks
pub struct GarmentMaskBuilder;

impl GarmentMaskBuilder {
    /// Combine a segmentation mask with the torso polygon and feather the result
    ///
    /// Missing or incomplete landmarks skip the polygon step; the result is then
    /// the blurred segmentation mask alone.
    ///
    /// # Errors
    /// - `blur_radius` is negative or not finite
    #[instrument(
        skip(segmentation, landmarks),
        fields(width = segmentation.width(), height = segmentation.height())
    )]
    pub fn build(
        segmentation: &Mask,
        landmarks: Option<&LandmarkSet>,
        blur_radius: f32,
    ) -> Result<GarmentMask> {
        let blur_radius = ControlValidator::validate_non_negative(blur_radius, "Mask blur radius")?;
        let dimensions = segmentation.dimensions();

        let polygon = landmarks.and_then(|set| set.torso_polygon(dimensions));
        let region = if let Some(polygon) = &polygon {
            let torso = Self::rasterize_polygon(polygon, dimensions);
            segmentation.intersect(&torso)?
        } else {
            debug!("Torso landmarks unavailable, using segmentation mask only");
            segmentation.clone()
        };

        let mask = Self::gaussian_blur(&region, blur_radius)?;

        Ok(GarmentMask {
            mask,
            blur_radius,
            torso_applied: polygon.is_some(),
        })
    }

    /// Rasterize a polygon as an opaque region
    ///
    /// Degenerate polygons (fewer than three distinct vertices) cover nothing.
    #[must_use]
    pub fn rasterize_polygon(polygon: &Polygon, dimensions: (u32, u32)) -> Mask {
        let (width, height) = dimensions;
        let mut canvas = GrayImage::new(width, height);

        let mut points: Vec<Point<i32>> = polygon
            .points()
            .iter()
            .map(|&(x, y)| Point::new(to_pixel(x, width), to_pixel(y, height)))
            .collect();
        points.dedup();
        // imageproc expects an open ring
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        if points.len() >= 3 {
            draw_polygon_mut(&mut canvas, &points, Luma([255u8]));
        }

        Mask::from_luma(&canvas)
    }

    /// Separable Gaussian smoothing with `sigma` in pixels
    ///
    /// A zero radius returns the input unchanged. Edges replicate the border
    /// pixel so coverage does not fade at the canvas boundary.
    ///
    /// # Errors
    /// - `sigma` is negative or not finite
    pub fn gaussian_blur(mask: &Mask, sigma: f32) -> Result<Mask> {
        let sigma = ControlValidator::validate_non_negative(sigma, "Mask blur radius")?;
        let (width, height) = mask.dimensions();
        if sigma == 0.0 || width == 0 || height == 0 {
            return Ok(mask.clone());
        }

        let kernel = gaussian_kernel(sigma, width.max(height));
        let (w, h) = (width as usize, height as usize);

        let mut horizontal = vec![0.0f32; w * h];
        for (src_row, dst_row) in mask.data().chunks_exact(w).zip(horizontal.chunks_exact_mut(w)) {
            convolve_line(src_row, dst_row, &kernel);
        }

        let mut column = vec![0.0f32; h];
        let mut blurred_column = vec![0.0f32; h];
        let mut output = vec![0.0f32; w * h];
        for x in 0..w {
            for (y, value) in column.iter_mut().enumerate() {
                *value = horizontal.get(y * w + x).copied().unwrap_or(0.0);
            }
            convolve_line(&column, &mut blurred_column, &kernel);
            for (y, value) in blurred_column.iter().enumerate() {
                if let Some(out) = output.get_mut(y * w + x) {
                    *out = *value;
                }
            }
        }

        Mask::new(output, (width, height))
    }
}

/// Normalized 1D Gaussian kernel spanning ±3σ
///
/// With clamp-to-edge sampling every tap at or beyond `max_radius` reads the
/// border pixel, so the kernel is cut there and the truncated tail weight is
/// folded into the outermost taps.
fn gaussian_kernel(sigma: f32, max_radius: u32) -> Vec<f32> {
    let denominator = 2.0 * sigma * sigma;
    if denominator < f32::MIN_POSITIVE {
        return vec![1.0];
    }
    let full_radius = (sigma * KERNEL_SIGMAS).ceil().max(1.0);
    let max_radius = max_radius.max(1) as f32;
    let radius = full_radius.min(max_radius) as i32;

    let mut weights: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let d = i as f32;
            (-(d * d) / denominator).exp()
        })
        .collect();

    if full_radius > max_radius {
        // Weight of a ±3σ Gaussian, approximated by the continuous integral
        let full_mass = TRUNCATED_GAUSSIAN_MASS * sigma * (2.0 * std::f32::consts::PI).sqrt();
        let tail = if full_mass.is_finite() {
            let kept: f32 = weights.iter().sum();
            ((full_mass - kept) / 2.0).max(0.0)
        } else {
            // Only the border taps carry weight in the limit
            weights.fill(0.0);
            1.0
        };
        if let Some(first) = weights.first_mut() {
            *first += tail;
        }
        if let Some(last) = weights.last_mut() {
            *last += tail;
        }
    }

    let sum: f32 = weights.iter().sum();
    for weight in &mut weights {
        *weight /= sum;
    }
    weights
}

/// Convolve one row or column with clamp-to-edge sampling
fn convolve_line(src: &[f32], dst: &mut [f32], kernel: &[f32]) {
    let last = src.len().saturating_sub(1) as i64;
    let radius = (kernel.len() / 2) as i64;
    for (i, out) in dst.iter_mut().enumerate() {
        let mut acc = 0.0f32;
        for (k, weight) in kernel.iter().enumerate() {
            let index = (i as i64 + k as i64 - radius).clamp(0, last) as usize;
            acc += weight * src.get(index).copied().unwrap_or(0.0);
        }
        *out = acc.clamp(0.0, 1.0);
    }
}

/// Round a pixel coordinate, bounding far off-canvas vertices
fn to_pixel(value: f32, extent: u32) -> i32 {
    let bound = extent as f32 * 4.0 + 1.0;
    value.round().clamp(-bound, bound) as i32
}
