//! Final flattening and export
//!
//! The render target (photo plus colorized garment) is drawn first; a placed
//! design is resampled through its inverse transform and composited with
//! source-over. Encoding runs on the blocking pool so callers can await it.

use crate::{
    config::OutputFormat,
    error::{MockupError, Result},
    overlay::{OverlayModel, PlacedOverlay},
    services::{ImageIOService, OutputFormatHandler},
};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Flattens the render target and the design overlay
pub struct Compositor;

impl Compositor {
    /// Compose the final image
    ///
    /// With an empty overlay the result is an exact copy of `base`. Overlay
    /// pixels that fall outside the canvas are clipped.
    ///
    /// # Errors
    /// - `base` is `None` (no photo selected)
    #[instrument(skip_all)]
    pub fn flatten(base: Option<&RgbaImage>, overlay: &OverlayModel) -> Result<RgbaImage> {
        let base = base.ok_or(MockupError::NoBaseImage)?;
        let mut output = base.clone();

        if let Some(placed) = overlay.placed() {
            draw_overlay(&mut output, placed);
        } else {
            debug!("No design placed, exporting render target as is");
        }

        Ok(output)
    }

    /// Encode a flattened image on the blocking pool
    ///
    /// # Errors
    /// - Encoding fails
    /// - The blocking task panics or is cancelled
    pub async fn encode(image: RgbaImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || OutputFormatHandler::encode(&image, format, jpeg_quality))
            .await
            .map_err(|e| MockupError::processing(format!("Encoding task failed: {e}")))?
    }

    /// Encode and atomically write a flattened image on the blocking pool
    ///
    /// # Errors
    /// - Encoding or writing fails
    /// - The blocking task panics or is cancelled
    pub async fn save(
        image: RgbaImage,
        path: impl AsRef<Path>,
        format: OutputFormat,
        jpeg_quality: u8,
    ) -> Result<PathBuf> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || {
            ImageIOService::save_image(&image, &path, format, jpeg_quality)
        })
        .await
        .map_err(|e| MockupError::processing(format!("Export task failed: {e}")))?
    }
}

/// Resample the design into `canvas` through the inverse placement transform
fn draw_overlay(canvas: &mut RgbaImage, placed: &PlacedOverlay) {
    let opacity = placed.transform().opacity;
    if opacity <= 0.0 {
        return;
    }
    let Some(inverse) = placed.matrix().invert() else {
        return;
    };

    let (canvas_w, canvas_h) = canvas.dimensions();
    let (min_x, min_y, max_x, max_y) = placed.bounds();
    let x_start = clip(min_x.floor(), canvas_w);
    let x_end = clip(max_x.ceil() + 1.0, canvas_w);
    let y_start = clip(min_y.floor(), canvas_h);
    let y_end = clip(max_y.ceil() + 1.0, canvas_h);

    let design = placed.image();
    for y in y_start..y_end {
        for x in x_start..x_end {
            let (u, v) = inverse.apply(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let source = sample_bilinear(design, u - 0.5, v - 0.5);
            if source[3] <= 0.0 {
                continue;
            }
            let pixel = canvas.get_pixel_mut(x, y);
            *pixel = source_over(*pixel, source, opacity);
        }
    }
}

fn clip(value: f32, extent: u32) -> u32 {
    value.clamp(0.0, extent as f32) as u32
}

/// Premultiplied bilinear sample; texels outside the design are transparent
fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> [f32; 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f32; 4];
    for (tx, ty, weight) in taps {
        if weight <= 0.0 {
            continue;
        }
        let texel = premultiplied_texel(image, tx, ty);
        for (sum, channel) in acc.iter_mut().zip(texel) {
            *sum += channel * weight;
        }
    }
    acc
}

fn premultiplied_texel(image: &RgbaImage, x: i64, y: i64) -> [f32; 4] {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return [0.0; 4];
    };
    match image.get_pixel_checked(x, y) {
        Some(Rgba([r, g, b, a])) => {
            let alpha = f32::from(*a) / 255.0;
            [
                f32::from(*r) / 255.0 * alpha,
                f32::from(*g) / 255.0 * alpha,
                f32::from(*b) / 255.0 * alpha,
                alpha,
            ]
        },
        None => [0.0; 4],
    }
}

/// Source-over a premultiplied source scaled by `opacity` onto a straight-alpha pixel
fn source_over(dst: Rgba<u8>, src: [f32; 4], opacity: f32) -> Rgba<u8> {
    let alpha_s = src[3] * opacity;
    let alpha_d = f32::from(dst[3]) / 255.0;
    let alpha_o = alpha_s + alpha_d * (1.0 - alpha_s);
    if alpha_o <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let premultiplied = src[i] * opacity + f32::from(dst[i]) / 255.0 * alpha_d * (1.0 - alpha_s);
        to_u8(premultiplied / alpha_o)
    };
    Rgba([channel(0), channel(1), channel(2), to_u8(alpha_o)])
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
