mod gallery;
mod uri;

pub use gallery::Gallery;
pub use uri::UriSource;

use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },
    #[error("unsupported URI scheme in {0}")]
    UnsupportedScheme(String),
    #[error("no example image at index {index} ({count} available)")]
    NoSuchExample { index: usize, count: usize },
}

/// Trait for places an image can be loaded from
pub trait ImageSource {
    /// Identifier of the image, used as the embedding cache key
    fn url(&self) -> String;

    /// Load and decode the image
    fn load(&self) -> Result<RgbImage, SourceError>;
}

/// An image file on local disk
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for FileSource {
    fn url(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<RgbImage, SourceError> {
        tracing::info!("Loading image from {}", self.path.display());

        let bytes = std::fs::read(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        decode(&bytes, &self.url())
    }
}

/// Pick a source for a dropped or typed location
///
/// Anything with a scheme is a URI; everything else is a file path.
pub fn from_location(location: &str) -> Box<dyn ImageSource> {
    if location.contains("://") {
        Box::new(UriSource::new(location))
    } else {
        Box::new(FileSource::new(location))
    }
}

fn decode(bytes: &[u8], url: &str) -> Result<RgbImage, SourceError> {
    let image = image::load_from_memory(bytes).map_err(|source| SourceError::Decode {
        url: url.to_string(),
        source,
    })?;
    Ok(image.to_rgb8())
}
