mod catalog;
mod preprocess;
mod sam;
pub mod types;

pub use catalog::{ModelCatalog, ModelSpec, DEFAULT_MODEL_ID};
pub use sam::SamOnnx;
pub use types::{Mask, SegmentationModel};

use anyhow::Result;

/// Builds models on the inference worker thread
pub trait ModelFactory: Send {
    fn create(&self, spec: &ModelSpec) -> Result<Box<dyn SegmentationModel>>;
}

/// Factory for SAM ONNX encoder/decoder pairs
pub struct OnnxModelFactory {
    intra_threads: usize,
}

impl OnnxModelFactory {
    pub fn new(intra_threads: usize) -> Self {
        Self { intra_threads }
    }
}

impl ModelFactory for OnnxModelFactory {
    fn create(&self, spec: &ModelSpec) -> Result<Box<dyn SegmentationModel>> {
        let model = SamOnnx::new(&spec.encoder, &spec.decoder, self.intra_threads)?;
        Ok(Box::new(model))
    }
}
