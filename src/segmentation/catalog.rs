use std::path::{Path, PathBuf};

/// Model ids and the file stem of their ONNX exports
const MODELS: &[(&str, &str)] = &[
    ("sam_mobile_tiny", "mobile_sam-tiny-vitt"),
    ("sam_base", "sam_vit_b_01ec64"),
];

pub const DEFAULT_MODEL_ID: &str = "sam_mobile_tiny";

/// A resolved model: its id plus the encoder and decoder files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: String,
    pub encoder: PathBuf,
    pub decoder: PathBuf,
}

/// Known models, resolved against a model directory
///
/// `<dir>/<stem>.encoder.onnx` and `<dir>/<stem>.decoder.onnx`
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    model_dir: PathBuf,
}

impl ModelCatalog {
    pub fn new<P: AsRef<Path>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.as_ref().to_path_buf(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        MODELS.iter().any(|(known, _)| *known == id)
    }

    pub fn resolve(&self, id: &str) -> Option<ModelSpec> {
        let (_, stem) = MODELS.iter().find(|(known, _)| *known == id)?;
        Some(ModelSpec {
            id: id.to_string(),
            encoder: self.model_dir.join(format!("{stem}.encoder.onnx")),
            decoder: self.model_dir.join(format!("{stem}.decoder.onnx")),
        })
    }
}
