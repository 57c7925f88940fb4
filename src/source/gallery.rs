use std::path::{Path, PathBuf};

use super::{FileSource, SourceError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Example images offered for one-click loading
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<PathBuf>,
}

impl Gallery {
    /// List the images in `dir`, sorted by file name
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let read_dir = std::fs::read_dir(dir).map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut entries: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        entries.sort();

        tracing::debug!("Found {} example images in {}", entries.len(), dir.display());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Result<FileSource, SourceError> {
        self.entries
            .get(index)
            .map(FileSource::new)
            .ok_or(SourceError::NoSuchExample {
                index,
                count: self.entries.len(),
            })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
