//! Design overlay placement
//!
//! The overlay is a flat 2D affine placement of a user design on the working
//! canvas. It is either `Empty` or `Placed`; every transform mutation requires
//! a placed design. Rotation and scale pivot on the design's own center, so
//! changing them never moves the visual center away from `position`.

use crate::{
    error::{MockupError, Result},
    utils::ControlValidator,
};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default fit: a freshly loaded design spans at most a third of the canvas
pub const DEFAULT_FIT_DIVISOR: f32 = 3.0;

/// Placement of a design on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayTransform {
    /// Canvas position of the design's center
    pub position: (f32, f32),
    /// Uniform scale, always positive
    pub scale: f32,
    /// Rotation in degrees, normalized to `[0, 360)`
    pub rotation: f32,
    /// Opacity in `[0, 1]`
    pub opacity: f32,
}

impl OverlayTransform {
    /// Default placement for an image on a canvas
    ///
    /// Centered, rotation 0, opacity 1, and scaled so the design fits within
    /// `1 / fit_divisor` of the canvas in both directions without upscaling.
    #[must_use]
    pub fn fit(canvas: (u32, u32), image: (u32, u32), fit_divisor: f32) -> Self {
        let (cw, ch) = (canvas.0 as f32, canvas.1 as f32);
        let (iw, ih) = (image.0 as f32, image.1 as f32);
        let scale = (cw / (iw * fit_divisor)).min(ch / (ih * fit_divisor)).min(1.0);

        Self {
            position: (cw / 2.0, ch / 2.0),
            scale,
            rotation: 0.0,
            opacity: 1.0,
        }
    }

    /// Image-to-canvas mapping for a design of `image` dimensions
    #[must_use]
    pub fn matrix(&self, image: (u32, u32)) -> Affine {
        let (iw, ih) = (f64::from(image.0), f64::from(image.1));
        Affine::translation(f64::from(self.position.0), f64::from(self.position.1))
            .then_rotate(f64::from(self.rotation).to_radians())
            .then_scale(f64::from(self.scale))
            .then_translate(-iw / 2.0, -ih / 2.0)
    }
}

/// 2D affine transform `x' = a·x + c·y + e`, `y' = b·x + d·y + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    #[must_use]
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self · other`: apply `other` first, then `self`
    #[must_use]
    pub fn multiply(&self, other: &Affine) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    #[must_use]
    pub fn then_translate(&self, tx: f64, ty: f64) -> Self {
        self.multiply(&Self::translation(tx, ty))
    }

    #[must_use]
    pub fn then_rotate(&self, radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        self.multiply(&Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        })
    }

    #[must_use]
    pub fn then_scale(&self, scale: f64) -> Self {
        self.multiply(&Self {
            a: scale,
            d: scale,
            ..Self::IDENTITY
        })
    }

    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse transform, `None` when singular
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return None;
        }
        Some(Self {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }
}

/// A loaded design with its live and default transforms
#[derive(Debug, Clone)]
pub struct PlacedOverlay {
    image: RgbaImage,
    transform: OverlayTransform,
    default_transform: OverlayTransform,
}

impl PlacedOverlay {
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn transform(&self) -> OverlayTransform {
        self.transform
    }

    /// Transform recorded when the design was loaded
    #[must_use]
    pub fn default_transform(&self) -> OverlayTransform {
        self.default_transform
    }

    /// Image-to-canvas mapping for the current transform
    #[must_use]
    pub fn matrix(&self) -> Affine {
        self.transform.matrix(self.image.dimensions())
    }

    /// Axis-aligned canvas bounds `(min_x, min_y, max_x, max_y)` of the transformed design
    #[must_use]
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        let matrix = self.matrix();
        let (w, h) = (f64::from(self.image.width()), f64::from(self.image.height()));
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(x, y)| matrix.apply(x, y));

        let xs = corners.map(|p| p.0);
        let ys = corners.map(|p| p.1);
        (
            xs.into_iter().fold(f64::INFINITY, f64::min) as f32,
            ys.into_iter().fold(f64::INFINITY, f64::min) as f32,
            xs.into_iter().fold(f64::NEG_INFINITY, f64::max) as f32,
            ys.into_iter().fold(f64::NEG_INFINITY, f64::max) as f32,
        )
    }
}

/// Overlay state for one working canvas
#[derive(Debug, Clone)]
pub struct OverlayModel {
    canvas: (u32, u32),
    fit_divisor: f32,
    placed: Option<PlacedOverlay>,
}

impl OverlayModel {
    /// Create an empty overlay for a canvas
    #[must_use]
    pub fn new(canvas: (u32, u32)) -> Self {
        Self {
            canvas,
            fit_divisor: DEFAULT_FIT_DIVISOR,
            placed: None,
        }
    }

    /// Override the default-fit divisor
    ///
    /// # Errors
    /// - `divisor` is not positive
    pub fn with_fit_divisor(mut self, divisor: f32) -> Result<Self> {
        self.fit_divisor = ControlValidator::validate_positive(divisor, "Design fit divisor")?;
        Ok(self)
    }

    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas
    }

    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.placed.is_some()
    }

    /// The placed design, or `None` when empty
    #[must_use]
    pub fn placed(&self) -> Option<&PlacedOverlay> {
        self.placed.as_ref()
    }

    #[must_use]
    pub fn transform(&self) -> Option<OverlayTransform> {
        self.placed.as_ref().map(PlacedOverlay::transform)
    }

    /// Place a design, replacing any existing one, at its default transform
    ///
    /// # Errors
    /// - The design or the canvas has a zero dimension
    pub fn load(&mut self, image: RgbaImage) -> Result<()> {
        let (iw, ih) = image.dimensions();
        if iw == 0 || ih == 0 {
            return Err(MockupError::decode("Design image has zero size"));
        }
        if self.canvas.0 == 0 || self.canvas.1 == 0 {
            return Err(MockupError::processing("Cannot place a design on an empty canvas"));
        }

        let default_transform = OverlayTransform::fit(self.canvas, (iw, ih), self.fit_divisor);
        debug!(
            "Placed {}x{} design at scale {:.3}",
            iw, ih, default_transform.scale
        );
        self.placed = Some(PlacedOverlay {
            image,
            transform: default_transform,
            default_transform,
        });
        Ok(())
    }

    /// Remove the design
    pub fn clear(&mut self) {
        self.placed = None;
    }

    /// # Errors
    /// - No design is placed
    /// - `scale` is not a positive finite number
    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        let placed = self.placed_mut()?;
        placed.transform.scale = ControlValidator::validate_positive(scale, "Overlay scale")?;
        Ok(())
    }

    /// Set rotation in degrees; any finite angle is accepted and normalized
    ///
    /// # Errors
    /// - No design is placed
    /// - `degrees` is not finite
    pub fn set_rotation(&mut self, degrees: f32) -> Result<()> {
        let placed = self.placed_mut()?;
        placed.transform.rotation = ControlValidator::normalize_degrees(degrees)?;
        Ok(())
    }

    /// # Errors
    /// - No design is placed
    /// - `opacity` lies outside `[0, 1]`
    pub fn set_opacity(&mut self, opacity: f32) -> Result<()> {
        let placed = self.placed_mut()?;
        placed.transform.opacity = ControlValidator::validate_unit_interval(opacity, "Overlay opacity")?;
        Ok(())
    }

    /// Move the design center; positions off the canvas are allowed
    ///
    /// # Errors
    /// - No design is placed
    /// - A coordinate is not finite
    pub fn set_position(&mut self, x: f32, y: f32) -> Result<()> {
        let placed = self.placed_mut()?;
        let x = ControlValidator::validate_finite(x, "Overlay x position")?;
        let y = ControlValidator::validate_finite(y, "Overlay y position")?;
        placed.transform.position = (x, y);
        Ok(())
    }

    /// Restore the transform recorded at load time
    ///
    /// # Errors
    /// - No design is placed
    pub fn reset(&mut self) -> Result<()> {
        let placed = self.placed_mut()?;
        placed.transform = placed.default_transform;
        Ok(())
    }

    fn placed_mut(&mut self) -> Result<&mut PlacedOverlay> {
        self.placed.as_mut().ok_or(MockupError::OverlayEmpty)
    }
}
