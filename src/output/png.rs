use super::OutputSink;
use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes RGBA images as PNG files
pub struct PngFileSink {
    path: PathBuf,
}

impl PngFileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl OutputSink for PngFileSink {
    fn write_image(&mut self, image: &RgbaImage) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Write to a sibling temp file, then rename into place
        let tmp = self.path.with_extension("png.tmp");
        image
            .save_with_format(&tmp, ImageFormat::Png)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {} into place", self.path.display()))?;

        tracing::info!(
            "Wrote {}x{} image to {}",
            image.width(),
            image.height(),
            self.path.display()
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
