use anyhow::Result;
use image::{GrayImage, RgbImage};

use crate::session::Point;

/// Selection mask: one alpha byte per source pixel, 255 = selected
/// Dimensions match the embedded image
pub type Mask = GrayImage;

/// Trait for point-prompted segmentation models
/// Allows swapping between backends (SAM ONNX exports, test doubles, ...)
pub trait SegmentationModel {
    /// Compute and keep the image embedding
    ///
    /// Must be called before [`SegmentationModel::segment`]. Calling it again
    /// replaces the previous embedding.
    fn embed(&mut self, image: &RgbImage) -> Result<()>;

    /// Predict a mask for the embedded image from prompt points
    ///
    /// # Arguments
    /// * `points` - Non-empty prompt points in normalized image coordinates
    ///
    /// # Returns
    /// * Mask at the resolution of the embedded image
    fn segment(&mut self, points: &[Point]) -> Result<Mask>;

    /// Drop the current embedding
    fn reset_state(&mut self) {
        // Default implementation: no-op for models without cached state
    }

    /// Get the model's preferred input dimensions
    ///
    /// Returns (width, height)
    fn input_size(&self) -> (u32, u32);
}
