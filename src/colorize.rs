//! Garment colorization
//!
//! A flat color layer is masked by the garment mask and composited onto the
//! photo with one of the separable compositing blend modes. The base image is
//! never mutated; every control change recomputes the result from scratch.

use crate::{
    error::{MockupError, Result},
    types::{Mask, RgbColor},
    utils::ControlValidator,
};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::instrument;

/// Separable blend modes available to the garment color layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    Normal,
    /// Darkens the photo by the color; keeps fabric shading (default)
    #[default]
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl BlendMode {
    pub const ALL: [BlendMode; 12] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
    ];

    /// CSS keyword for this mode
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Multiply => "multiply",
            Self::Screen => "screen",
            Self::Overlay => "overlay",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::ColorDodge => "color-dodge",
            Self::ColorBurn => "color-burn",
            Self::HardLight => "hard-light",
            Self::SoftLight => "soft-light",
            Self::Difference => "difference",
            Self::Exclusion => "exclusion",
        }
    }

    /// Blend one backdrop channel `cb` with one source channel `cs`
    #[must_use]
    pub fn blend_channel(self, cb: f32, cs: f32) -> f32 {
        match self {
            Self::Normal => cs,
            Self::Multiply => cb * cs,
            Self::Screen => screen(cb, cs),
            Self::Overlay => hard_light(cs, cb),
            Self::Darken => cb.min(cs),
            Self::Lighten => cb.max(cs),
            Self::ColorDodge => {
                if cb <= 0.0 {
                    0.0
                } else if cs >= 1.0 {
                    1.0
                } else {
                    (cb / (1.0 - cs)).min(1.0)
                }
            },
            Self::ColorBurn => {
                if cb >= 1.0 {
                    1.0
                } else if cs <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - cb) / cs).min(1.0)
                }
            },
            Self::HardLight => hard_light(cb, cs),
            Self::SoftLight => soft_light(cb, cs),
            Self::Difference => (cb - cs).abs(),
            Self::Exclusion => cb + cs - 2.0 * cb * cs,
        }
    }
}

fn screen(cb: f32, cs: f32) -> f32 {
    cb + cs - cb * cs
}

fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb * 2.0 * cs
    } else {
        screen(cb, 2.0 * cs - 1.0)
    }
}

fn soft_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        let d = if cb <= 0.25 {
            ((16.0 * cb - 12.0) * cb + 4.0) * cb
        } else {
            cb.sqrt()
        };
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendMode {
    type Err = MockupError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| {
                MockupError::invalid_config(format!(
                    "Unknown blend mode '{s}'. Supported: {}",
                    Self::ALL.map(BlendMode::as_str).join(", ")
                ))
            })
    }
}

/// Garment color controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShirtStyle {
    pub color: RgbColor,
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

impl Default for ShirtStyle {
    fn default() -> Self {
        Self {
            color: RgbColor::default(),
            opacity: 1.0,
            blend_mode: BlendMode::default(),
        }
    }
}

/// Composites a flat color through a garment mask
pub struct Colorizer;

impl Colorizer {
    /// Render `base` with the masked color layer blended on top
    ///
    /// Pixels where the mask is 0 are copied unchanged; fractional coverage
    /// scales the color layer's alpha.
    ///
    /// # Errors
    /// - Mask and base dimensions differ
    /// - `opacity` lies outside `[0, 1]`
    #[instrument(skip(base, mask), fields(width = base.width(), height = base.height()))]
    pub fn colorize(
        base: &RgbaImage,
        mask: &Mask,
        color: RgbColor,
        blend_mode: BlendMode,
        opacity: f32,
    ) -> Result<RgbaImage> {
        let opacity = ControlValidator::validate_unit_interval(opacity, "Shirt opacity")?;
        if mask.dimensions() != base.dimensions() {
            return Err(MockupError::dimension_mismatch(
                base.dimensions(),
                mask.dimensions(),
            ));
        }

        let source = color.to_unit();
        let mut output = base.clone();
        for (pixel, &coverage) in output.pixels_mut().zip(mask.data()) {
            let alpha = coverage * opacity;
            if alpha > 0.0 {
                *pixel = blend_pixel(*pixel, source, blend_mode, alpha);
            }
        }

        Ok(output)
    }

    /// Colorize using a [`ShirtStyle`]
    ///
    /// # Errors
    /// - See [`Colorizer::colorize`]
    pub fn apply_style(base: &RgbaImage, mask: &Mask, style: &ShirtStyle) -> Result<RgbaImage> {
        Self::colorize(base, mask, style.color, style.blend_mode, style.opacity)
    }
}

/// Blend then source-over one pixel with a source of alpha `alpha_s`
fn blend_pixel(backdrop: Rgba<u8>, source: [f32; 3], mode: BlendMode, alpha_s: f32) -> Rgba<u8> {
    let Rgba([r, g, b, a]) = backdrop;
    let alpha_b = f32::from(a) / 255.0;
    let alpha_o = alpha_s + alpha_b * (1.0 - alpha_s);
    if alpha_o <= 0.0 {
        return backdrop;
    }

    let channel = |cb: u8, cs: f32| {
        let cb = f32::from(cb) / 255.0;
        let blended = (1.0 - alpha_b) * cs + alpha_b * mode.blend_channel(cb, cs);
        let composed = (alpha_s * blended + alpha_b * cb * (1.0 - alpha_s)) / alpha_o;
        to_u8(composed)
    };

    Rgba([
        channel(r, source[0]),
        channel(g, source[1]),
        channel(b, source[2]),
        to_u8(alpha_o),
    ])
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(pixel))
    }

    #[test]
    fn test_multiply_half_opacity_matches_reference() {
        let base = solid(2, 1, [100, 150, 200, 255]);
        let mask = Mask::new(vec![1.0, 0.0], (2, 1)).unwrap();

        let out = Colorizer::colorize(&base, &mask, RgbColor::new(255, 0, 0), BlendMode::Multiply, 0.5)
            .unwrap();

        assert_eq!(out.get_pixel(0, 0), &Rgba([100, 75, 100, 255]));
        assert_eq!(out.get_pixel(1, 0), base.get_pixel(1, 0));
    }

    #[test]
    fn test_fractional_mask_blends_proportionally() {
        let base = solid(3, 1, [200, 200, 200, 255]);
        let mask = Mask::new(vec![0.0, 0.5, 1.0], (3, 1)).unwrap();

        let out = Colorizer::colorize(&base, &mask, RgbColor::new(0, 0, 0), BlendMode::Normal, 1.0)
            .unwrap();

        assert_eq!(out.get_pixel(0, 0)[0], 200);
        assert_eq!(out.get_pixel(1, 0)[0], 100);
        assert_eq!(out.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_base_is_not_mutated_and_output_is_deterministic() {
        let base = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
        let snapshot = base.clone();
        let mask = Mask::filled((16, 16), 0.7);

        let first = Colorizer::colorize(&base, &mask, RgbColor::new(12, 200, 80), BlendMode::SoftLight, 0.8)
            .unwrap();
        let second = Colorizer::colorize(&base, &mask, RgbColor::new(12, 200, 80), BlendMode::SoftLight, 0.8)
            .unwrap();

        assert_eq!(base, snapshot);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_zero_opacity_is_identity() {
        let base = solid(4, 4, [10, 20, 30, 255]);
        let mask = Mask::filled((4, 4), 1.0);
        for mode in BlendMode::ALL {
            let out = Colorizer::colorize(&base, &mask, RgbColor::new(255, 255, 0), mode, 0.0).unwrap();
            assert_eq!(out, base, "{mode}");
        }
    }

    #[test]
    fn test_blend_channel_reference_values() {
        assert_eq!(BlendMode::Multiply.blend_channel(0.5, 0.5), 0.25);
        assert_eq!(BlendMode::Screen.blend_channel(0.5, 0.5), 0.75);
        assert_eq!(BlendMode::Darken.blend_channel(0.2, 0.6), 0.2);
        assert_eq!(BlendMode::Lighten.blend_channel(0.2, 0.6), 0.6);
        assert_eq!(BlendMode::Difference.blend_channel(0.25, 0.75), 0.5);
        assert_eq!(BlendMode::ColorDodge.blend_channel(0.0, 1.0), 0.0);
        assert_eq!(BlendMode::ColorBurn.blend_channel(1.0, 0.0), 1.0);
        assert_eq!(BlendMode::Overlay.blend_channel(0.25, 1.0), 0.5);
        assert_eq!(BlendMode::HardLight.blend_channel(1.0, 0.25), 0.5);
        for mode in BlendMode::ALL {
            for (cb, cs) in [(0.0, 0.0), (0.3, 0.9), (1.0, 0.1), (1.0, 1.0)] {
                let v = mode.blend_channel(cb, cs);
                assert!((0.0..=1.0).contains(&v), "{mode} produced {v}");
            }
        }
    }

    #[test]
    fn test_transparent_backdrop_takes_source_color() {
        let base = solid(1, 1, [0, 0, 0, 0]);
        let mask = Mask::filled((1, 1), 1.0);
        let out = Colorizer::colorize(&base, &mask, RgbColor::new(0, 128, 255), BlendMode::Multiply, 1.0)
            .unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 128, 255, 255]));
    }

    #[test]
    fn test_invalid_inputs() {
        let base = solid(2, 2, [0, 0, 0, 255]);
        let mask = Mask::filled((3, 2), 1.0);
        assert!(matches!(
            Colorizer::colorize(&base, &mask, RgbColor::default(), BlendMode::Normal, 1.0),
            Err(MockupError::DimensionMismatch { .. })
        ));

        let mask = Mask::filled((2, 2), 1.0);
        assert!(Colorizer::colorize(&base, &mask, RgbColor::default(), BlendMode::Normal, 1.5).is_err());
    }

    #[test]
    fn test_blend_mode_parsing() {
        assert_eq!(BlendMode::default(), BlendMode::Multiply);
        assert_eq!("color-dodge".parse::<BlendMode>().unwrap(), BlendMode::ColorDodge);
        assert_eq!("Hard_Light".parse::<BlendMode>().unwrap(), BlendMode::HardLight);
        assert!("luminosity".parse::<BlendMode>().is_err());
        for mode in BlendMode::ALL {
            assert_eq!(mode.to_string().parse::<BlendMode>().unwrap(), mode);
        }

        let json = serde_json::to_string(&BlendMode::SoftLight).unwrap();
        assert_eq!(json, "\"soft-light\"");
    }
}
