//! Segmentation from tensor-in/tensor-out model backends
//!
//! The photo is letterboxed into a square NCHW tensor, the backend produces a
//! `1x1xHxW` probability map, and the map is sampled back onto the photo
//! through the inverse letterbox transform.

use crate::{
    error::{MockupError, Result},
    providers::SegmentationProvider,
    types::Mask,
};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage, RgbaImage};
use ndarray::Array4;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Input tensor layout expected by a segmentation backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorSpec {
    /// Side of the square model input
    pub input_size: u32,
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
    /// Letterbox padding color
    pub padding_color: [u8; 3],
}

impl Default for TensorSpec {
    fn default() -> Self {
        Self {
            input_size: 256,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [0.5, 0.5, 0.5],
            padding_color: [0, 0, 0],
        }
    }
}

/// A segmentation model operating on NCHW tensors
pub trait SegmentationBackend: Send {
    /// Tensor layout this backend expects
    fn spec(&self) -> TensorSpec;

    /// Run the model on a `1x3xSxS` input, returning a `1x1xHxW` probability map
    ///
    /// # Errors
    /// - Model inference failures
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;
}

/// Placement of the resized photo inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    /// Fit `dimensions` into a square of side `target`, centered
    #[must_use]
    pub fn fit(dimensions: (u32, u32), target: u32) -> Self {
        let (width, height) = (dimensions.0.max(1) as f32, dimensions.1.max(1) as f32);
        let target_f = target as f32;
        let scale = (target_f / width).min(target_f / height);
        let scaled_width = ((width * scale).round() as u32).clamp(1, target.max(1));
        let scaled_height = ((height * scale).round() as u32).clamp(1, target.max(1));

        Self {
            scale,
            offset_x: target.saturating_sub(scaled_width) / 2,
            offset_y: target.saturating_sub(scaled_height) / 2,
            scaled_width,
            scaled_height,
        }
    }
}

/// Segmentation provider wrapping a [`SegmentationBackend`]
///
/// Preprocessing and inference run on the blocking thread pool; concurrent
/// requests take turns on the backend.
pub struct TensorSegmentationProvider<B> {
    name: String,
    backend: Arc<Mutex<B>>,
}

impl<B: SegmentationBackend + 'static> TensorSegmentationProvider<B> {
    pub fn new<S: Into<String>>(name: S, backend: B) -> Self {
        Self {
            name: name.into(),
            backend: Arc::new(Mutex::new(backend)),
        }
    }

    /// Letterbox and normalize a photo into a `1x3xSxS` tensor
    ///
    /// # Errors
    /// - The photo has a zero dimension
    /// - The model input size is zero
    pub fn preprocess(image: &RgbaImage, spec: &TensorSpec) -> Result<(Array4<f32>, Letterbox)> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || spec.input_size == 0 {
            return Err(MockupError::processing_stage_error(
                "preprocess",
                "empty image or model input",
                Some(&format!("{width}x{height} -> {}", spec.input_size)),
            ));
        }

        let letterbox = Letterbox::fit((width, height), spec.input_size);
        let rgb: RgbImage = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let resized = image::imageops::resize(
            &rgb,
            letterbox.scaled_width,
            letterbox.scaled_height,
            FilterType::Triangle,
        );

        let size = spec.input_size;
        let mut canvas: RgbImage = ImageBuffer::from_pixel(size, size, Rgb(spec.padding_color));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = (f32::from(pixel[channel]) / 255.0 - spec.normalization_mean[channel])
                    / spec.normalization_std[channel];
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = value;
                }
            }
        }

        Ok((tensor, letterbox))
    }

    /// Sample a `1x1xHxW` probability map back onto the photo
    ///
    /// # Errors
    /// - The tensor does not have a single batch and channel
    pub fn tensor_to_mask(
        tensor: &Array4<f32>,
        letterbox: &Letterbox,
        spec: &TensorSpec,
        dimensions: (u32, u32),
    ) -> Result<Mask> {
        let (batch, channels, out_h, out_w) = tensor.dim();
        if batch != 1 || channels != 1 || out_h == 0 || out_w == 0 {
            return Err(MockupError::processing(format!(
                "Invalid output tensor shape {:?}",
                tensor.shape()
            )));
        }

        // Output maps may be smaller than the input (e.g. stride-2 heads)
        let ratio_x = out_w as f32 / spec.input_size as f32;
        let ratio_y = out_h as f32 / spec.input_size as f32;

        let (width, height) = dimensions;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let input_x = (x as f32 + 0.5) * letterbox.scale + letterbox.offset_x as f32;
                let input_y = (y as f32 + 0.5) * letterbox.scale + letterbox.offset_y as f32;
                let tx = ((input_x * ratio_x).floor() as usize).min(out_w - 1);
                let ty = ((input_y * ratio_y).floor() as usize).min(out_h - 1);
                data.push(tensor.get([0, 0, ty, tx]).copied().unwrap_or(0.0));
            }
        }

        Mask::new(data, dimensions)
    }
}

#[async_trait]
impl<B: SegmentationBackend + 'static> SegmentationProvider for TensorSegmentationProvider<B> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, image), fields(provider = %self.name))]
    async fn segment(&self, image: &RgbaImage) -> Result<Mask> {
        let backend = Arc::clone(&self.backend);
        let name = self.name.clone();
        let image = image.clone();

        tokio::task::spawn_blocking(move || {
            let mut backend = backend
                .lock()
                .map_err(|_| MockupError::provider_error(&name, "Segmentation", "backend lock poisoned"))?;
            let spec = backend.spec();
            let (input, letterbox) = Self::preprocess(&image, &spec)?;

            let output = backend
                .infer(&input)
                .map_err(|e| MockupError::provider_error(&name, "Segmentation", &e.to_string()))?;
            debug!("Backend produced {:?} probability map", output.shape());

            Self::tensor_to_mask(&output, &letterbox, &spec, image.dimensions())
        })
        .await
        .map_err(|e| {
            let details = format!("inference task failed: {e}");
            MockupError::provider_error(&self.name, "Segmentation", &details)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::BrightnessBackend;
    use image::Rgba;

    fn half_white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn test_letterbox_fit() {
        let letterbox = Letterbox::fit((500, 1000), 256);
        assert_eq!(letterbox.scaled_height, 256);
        assert_eq!(letterbox.scaled_width, 128);
        assert_eq!(letterbox.offset_x, 64);
        assert_eq!(letterbox.offset_y, 0);
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let spec = TensorSpec::default();
        let image = half_white(100, 200);
        let (tensor, letterbox) =
            TensorSegmentationProvider::<BrightnessBackend>::preprocess(&image, &spec).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 256, 256]);
        // left padding column is black, normalized to -1
        assert_eq!(tensor[[0, 0, 128, 0]], -1.0);
        // first photo column is white, normalized to 1
        let first = letterbox.offset_x as usize;
        assert!((tensor[[0, 0, 128, first]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_output_shape() {
        let spec = TensorSpec::default();
        let letterbox = Letterbox::fit((10, 10), spec.input_size);
        let tensor = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(TensorSegmentationProvider::<BrightnessBackend>::tensor_to_mask(
            &tensor,
            &letterbox,
            &spec,
            (10, 10)
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_segment_maps_back_to_photo() {
        let provider = TensorSegmentationProvider::new("brightness", BrightnessBackend::default());
        let image = half_white(120, 80);

        let mask = provider.segment(&image).await.unwrap();
        assert_eq!(mask.dimensions(), (120, 80));
        assert!(mask.get(10, 40) > 0.9);
        assert!(mask.get(110, 40) < 0.1);
        assert_eq!(provider.name(), "brightness");
    }

    /// Backend that holds its thread like a real model would
    struct SlowBackend(BrightnessBackend);

    impl SegmentationBackend for SlowBackend {
        fn spec(&self) -> TensorSpec {
            self.0.spec()
        }

        fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
            std::thread::sleep(std::time::Duration::from_millis(200));
            self.0.infer(input)
        }
    }

    #[tokio::test]
    async fn test_inference_does_not_block_runtime() {
        let provider = TensorSegmentationProvider::new("slow", SlowBackend(BrightnessBackend::default()));
        let image = half_white(40, 40);

        let (mask, ticked) = tokio::join!(
            async {
                let mask = provider.segment(&image).await;
                (mask, std::time::Instant::now())
            },
            async {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                std::time::Instant::now()
            }
        );
        let (mask, segmented) = mask;
        assert_eq!(mask.unwrap().dimensions(), (40, 40));
        assert!(ticked < segmented);
    }
}
