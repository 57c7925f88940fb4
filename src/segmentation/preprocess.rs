use anyhow::{ensure, Result};
use image::{imageops, RgbImage};
use ndarray::{Array2, Array3, Array4};

use super::types::Mask;
use crate::session::Point;

/// Per-channel pixel mean and std used by SAM image encoders
const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Label of the padding point appended to every prompt
const PADDING_LABEL: f32 = -1.0;

/// Preprocessor for converting RGB images and prompts to SAM input tensors
pub struct Preprocessor {
    target_size: u32,
}

impl Preprocessor {
    pub fn new(target_size: u32) -> Self {
        Self { target_size }
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Size of the image once its longest side is scaled to the target
    pub fn scaled_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.scale(width, height);
        let w = (width as f32 * scale + 0.5) as u32;
        let h = (height as f32 * scale + 0.5) as u32;
        (w.max(1), h.max(1))
    }

    fn scale(&self, width: u32, height: u32) -> f32 {
        self.target_size as f32 / width.max(height) as f32
    }

    /// Preprocess an RGB image into a normalized, padded NCHW tensor
    ///
    /// Steps:
    /// 1. Resize so the longest side equals the target size
    /// 2. Normalize each channel with the encoder mean and std
    /// 3. Zero-pad bottom and right to a square and transpose to NCHW
    ///
    /// Returns: Array4<f32> with shape [1, 3, target, target]
    pub fn preprocess(&self, image: &RgbImage) -> Result<Array4<f32>> {
        let _span = tracing::debug_span!("preprocess").entered();

        let (width, height) = image.dimensions();
        ensure!(width > 0 && height > 0, "Cannot embed an empty image");

        let (scaled_w, scaled_h) = self.scaled_size(width, height);
        let resized = if (width, height) != (scaled_w, scaled_h) {
            imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle)
        } else {
            image.clone()
        };

        let size = self.target_size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - PIXEL_MEAN[c]) / PIXEL_STD[c];
            }
        }

        Ok(tensor)
    }

    /// Map normalized prompt points into decoder inputs
    ///
    /// Returns `(point_coords [1, n + 1, 2], point_labels [1, n + 1])` in
    /// resized-image pixel space, with the padding point SAM expects when no
    /// box prompt is given.
    pub fn prompt_tensors(
        &self,
        points: &[Point],
        image_width: u32,
        image_height: u32,
    ) -> Result<(Array3<f32>, Array2<f32>)> {
        ensure!(!points.is_empty(), "At least one prompt point is required");

        let (scaled_w, scaled_h) = self.scaled_size(image_width, image_height);
        let count = points.len() + 1;

        let mut coords = Array3::<f32>::zeros((1, count, 2));
        let mut labels = Array2::<f32>::zeros((1, count));

        for (i, point) in points.iter().enumerate() {
            coords[[0, i, 0]] = point.x * scaled_w as f32;
            coords[[0, i, 1]] = point.y * scaled_h as f32;
            labels[[0, i]] = if point.is_foreground { 1.0 } else { 0.0 };
        }
        labels[[0, count - 1]] = PADDING_LABEL;

        Ok((coords, labels))
    }

    /// Threshold mask logits and resize them to the target dimensions
    ///
    /// # Arguments
    /// * `logits` - Flattened logits in row-major order
    /// * `mask_width` - Width of the logits grid
    /// * `mask_height` - Height of the logits grid
    /// * `target_width` - Desired output width
    /// * `target_height` - Desired output height
    pub fn postprocess_mask(
        logits: &[f32],
        mask_width: u32,
        mask_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Result<Mask> {
        let _span = tracing::debug_span!("postprocess").entered();

        ensure!(
            logits.len() >= (mask_width * mask_height) as usize,
            "Mask logits hold {} values, expected {}x{}",
            logits.len(),
            mask_width,
            mask_height
        );

        let mask = Mask::from_fn(mask_width, mask_height, |x, y| {
            let idx = (y * mask_width + x) as usize;
            image::Luma([if logits[idx] > 0.0 { 255 } else { 0 }])
        });

        // If dimensions match, no resize needed
        if (mask_width, mask_height) == (target_width, target_height) {
            return Ok(mask);
        }

        Ok(imageops::resize(
            &mask,
            target_width,
            target_height,
            imageops::FilterType::Nearest,
        ))
    }
}
