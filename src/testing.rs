//! Test doubles for the segmentation model seam

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use image::RgbImage;

use crate::segmentation::{Mask, ModelFactory, ModelSpec, SegmentationModel};
use crate::session::Point;
use crate::source::{ImageSource, SourceError};

#[derive(Debug, Clone, PartialEq)]
pub enum ModelCall {
    Create(String),
    Embed(u32, u32),
    Segment(Vec<Point>),
}

pub type CallLog = Arc<Mutex<Vec<ModelCall>>>;

/// Factory for [`FakeModel`]s sharing one call log
pub struct FakeFactory {
    calls: CallLog,
    segment_error: Option<String>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            segment_error: None,
        }
    }

    pub fn failing_segment(mut self, message: &str) -> Self {
        self.segment_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

impl ModelFactory for FakeFactory {
    fn create(&self, spec: &ModelSpec) -> Result<Box<dyn SegmentationModel>> {
        self.calls.lock().unwrap().push(ModelCall::Create(spec.id.clone()));
        Ok(Box::new(FakeModel {
            calls: self.calls.clone(),
            size: None,
            segment_error: self.segment_error.clone(),
        }))
    }
}

/// Selects the left half of the image for any prompt
pub struct FakeModel {
    calls: CallLog,
    size: Option<(u32, u32)>,
    segment_error: Option<String>,
}

impl SegmentationModel for FakeModel {
    fn embed(&mut self, image: &RgbImage) -> Result<()> {
        let (w, h) = image.dimensions();
        self.calls.lock().unwrap().push(ModelCall::Embed(w, h));
        self.size = Some((w, h));
        Ok(())
    }

    fn segment(&mut self, points: &[Point]) -> Result<Mask> {
        self.calls
            .lock()
            .unwrap()
            .push(ModelCall::Segment(points.to_vec()));
        if let Some(message) = &self.segment_error {
            bail!("{message}");
        }
        let Some((w, h)) = self.size else {
            bail!("not embedded");
        };
        Ok(half_mask(w, h))
    }

    fn reset_state(&mut self) {
        self.size = None;
    }

    fn input_size(&self) -> (u32, u32) {
        (16, 16)
    }
}

/// Mask selecting the left half of a `w`x`h` image
pub fn half_mask(w: u32, h: u32) -> Mask {
    Mask::from_fn(w, h, |x, _| image::Luma([if x < w / 2 { 255 } else { 0 }]))
}

/// Image source backed by an in-memory image
pub struct MemorySource {
    url: String,
    image: RgbImage,
}

impl MemorySource {
    pub fn blank(url: &str, w: u32, h: u32) -> Self {
        Self {
            url: url.to_string(),
            image: RgbImage::from_pixel(w, h, image::Rgb([120, 130, 140])),
        }
    }
}

impl ImageSource for MemorySource {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn load(&self) -> Result<RgbImage, SourceError> {
        Ok(self.image.clone())
    }
}
