//! Canvas compositing for the segmentation session
//!
//! Two canvases are kept: the base canvas holding the source image, and the
//! overlay canvas holding the tinted, mask-clipped copy plus point markers.

use image::{imageops, Rgba, RgbImage, RgbaImage};
use thiserror::Error;

use crate::segmentation::Mask;
use crate::session::Point;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("no image has been drawn")]
    MissingImage,
    #[error("no mask is available")]
    MissingMask,
    #[error("cannot composite an empty image")]
    EmptyImage,
}

/// Colours and sizes used for the overlay canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Tint colour for the selected region
    pub mask_rgb: [u8; 3],
    /// Tint opacity in [0, 1]
    pub mask_alpha: f32,
    pub foreground_rgb: [u8; 3],
    pub background_rgb: [u8; 3],
    /// Marker radius in image pixels
    pub marker_radius: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            mask_rgb: [255, 0, 0],
            mask_alpha: 0.6,
            foreground_rgb: [0, 255, 255],
            background_rgb: [255, 255, 0],
            marker_radius: 3.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Compositor {
    base: Option<RgbaImage>,
    overlay: Option<RgbaImage>,
    style: OverlayStyle,
}

impl Compositor {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            base: None,
            overlay: None,
            style,
        }
    }

    pub fn base(&self) -> Option<&RgbaImage> {
        self.base.as_ref()
    }

    pub fn overlay(&self) -> Option<&RgbaImage> {
        self.overlay.as_ref()
    }

    /// Replace the base canvas with the source image
    pub fn draw_image(&mut self, image: &RgbImage) -> Result<(), CompositeError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(CompositeError::EmptyImage);
        }
        self.base = Some(RgbaImage::from_fn(w, h, |x, y| {
            let [r, g, b] = image.get_pixel(x, y).0;
            Rgba([r, g, b, 255])
        }));
        self.overlay = None;
        Ok(())
    }

    /// Render the tinted mask region and the point markers
    ///
    /// The base canvas is tinted with the mask colour (source-atop), cut to
    /// the mask alpha (destination-in), then markers are drawn on top.
    pub fn draw_mask(&mut self, mask: &Mask, points: &[Point]) -> Result<(), CompositeError> {
        let _span = tracing::debug_span!("draw_mask").entered();

        let base = self.base.as_ref().ok_or(CompositeError::MissingImage)?;
        let (w, h) = base.dimensions();
        let mask = fit_mask(mask, w, h);

        let alpha = self.style.mask_alpha.clamp(0.0, 1.0);
        let tint = self.style.mask_rgb;
        let mut overlay = RgbaImage::from_fn(w, h, |x, y| {
            let src = base.get_pixel(x, y).0;
            let coverage = mask.get_pixel(x, y)[0];
            let mut out = [0u8; 4];
            for c in 0..3 {
                out[c] = (tint[c] as f32 * alpha + src[c] as f32 * (1.0 - alpha)).round() as u8;
            }
            out[3] = ((src[3] as u16 * coverage as u16) / 255) as u8;
            Rgba(out)
        });

        for point in points {
            let rgb = if point.is_foreground {
                self.style.foreground_rgb
            } else {
                self.style.background_rgb
            };
            fill_circle(
                &mut overlay,
                point.x * w as f32,
                point.y * h as f32,
                self.style.marker_radius,
                Rgba([rgb[0], rgb[1], rgb[2], 255]),
            );
        }

        self.overlay = Some(overlay);
        Ok(())
    }

    pub fn clear_mask(&mut self) {
        self.overlay = None;
    }

    pub fn clear(&mut self) {
        self.base = None;
        self.overlay = None;
    }

    /// Flatten the overlay onto the base canvas
    pub fn preview(&self) -> Result<RgbaImage, CompositeError> {
        let mut flat = self.base.clone().ok_or(CompositeError::MissingImage)?;
        if let Some(overlay) = &self.overlay {
            imageops::overlay(&mut flat, overlay, 0, 0);
        }
        Ok(flat)
    }
}

/// Cut the masked region out of the original image
///
/// The mask is drawn onto a fresh canvas the size of the image, then the
/// image is drawn source-in: colour comes from the image, alpha from the mask.
pub fn cutout(image: &RgbImage, mask: &Mask) -> Result<RgbaImage, CompositeError> {
    let _span = tracing::debug_span!("cutout").entered();

    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(CompositeError::EmptyImage);
    }
    let mask = fit_mask(mask, w, h);

    Ok(RgbaImage::from_fn(w, h, |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Rgba([r, g, b, mask.get_pixel(x, y)[0]])
    }))
}

fn fit_mask(mask: &Mask, width: u32, height: u32) -> Mask {
    if mask.dimensions() == (width, height) {
        mask.clone()
    } else {
        tracing::debug!(
            "Resizing mask from {:?} to {}x{}",
            mask.dimensions(),
            width,
            height
        );
        imageops::resize(mask, width, height, imageops::FilterType::Nearest)
    }
}

fn fill_circle(canvas: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let (w, h) = canvas.dimensions();
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w);
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h);

    for y in y0..y1 {
        for x in x0..x1 {
            // Sample at pixel centres
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                canvas.put_pixel(x, y, color);
            }
        }
    }
}
