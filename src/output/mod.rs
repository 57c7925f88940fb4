mod png;

pub use png::PngFileSink;

use anyhow::Result;
use image::RgbaImage;

/// Default file name of an exported cutout
pub const CUTOUT_FILE_NAME: &str = "cutout.png";

/// Trait for output destinations
pub trait OutputSink {
    /// Write a rendered image to the output
    fn write_image(&mut self, image: &RgbaImage) -> Result<()>;

    /// Human-readable location of the output
    fn location(&self) -> String;
}
