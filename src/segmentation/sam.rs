use super::preprocess::Preprocessor;
use super::types::{Mask, SegmentationModel};
use crate::session::Point;
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ndarray::{s, Array1, Array4, ArrayD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Side length of the square SAM encoder input
pub const SAM_INPUT_SIZE: u32 = 1024;

/// Side length of the low-resolution mask prompt the decoder accepts
const MASK_INPUT_SIZE: usize = 256;

/// Segment Anything model split into an image encoder and a prompt decoder
///
/// The encoder runs once per image; its embedding is kept and reused by
/// every decoder call until the next `embed`.
pub struct SamOnnx {
    encoder: Session,
    decoder: Session,
    preprocessor: Preprocessor,

    // Embedding of the current image and that image's size
    embedding: Option<ArrayD<f32>>,
    image_size: (u32, u32),
}

impl SamOnnx {
    /// Load a SAM encoder/decoder pair from ONNX files
    ///
    /// # Arguments
    /// * `encoder_path` - Image encoder producing `[1, 256, 64, 64]` embeddings
    /// * `decoder_path` - Prompt decoder with the standard SAM ONNX inputs
    /// * `intra_threads` - Intra-op thread count for both sessions
    pub fn new<P: AsRef<Path>>(encoder_path: P, decoder_path: P, intra_threads: usize) -> Result<Self> {
        let encoder = load_session(encoder_path.as_ref(), intra_threads)?;
        let decoder = load_session(decoder_path.as_ref(), intra_threads)?;

        Ok(Self {
            encoder,
            decoder,
            preprocessor: Preprocessor::new(SAM_INPUT_SIZE),
            embedding: None,
            image_size: (0, 0),
        })
    }
}

fn load_session(path: &Path, intra_threads: usize) -> Result<Session> {
    tracing::info!("Loading ONNX model from {}", path.display());

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load model from {}", path.display()))?;

    tracing::info!("Model {} loaded successfully", path.display());
    Ok(session)
}

impl SegmentationModel for SamOnnx {
    fn embed(&mut self, image: &RgbImage) -> Result<()> {
        let _span = tracing::debug_span!("sam_embed").entered();

        let input_tensor = self.preprocessor.preprocess(image)?;

        let embedding = {
            let _infer_span = tracing::debug_span!("encoder").entered();
            let outputs = self
                .encoder
                .run(ort::inputs![Tensor::from_array(input_tensor)?])
                .context("Failed to run image encoder")?;

            // Embedding is the first encoder output
            outputs[0].try_extract_array::<f32>()?.to_owned()
        };

        tracing::debug!("Image embedding shape: {:?}", embedding.shape());
        self.embedding = Some(embedding);
        self.image_size = image.dimensions();
        Ok(())
    }

    fn segment(&mut self, points: &[Point]) -> Result<Mask> {
        let _span = tracing::debug_span!("sam_segment").entered();

        let embedding = self
            .embedding
            .clone()
            .ok_or_else(|| anyhow!("No image has been embedded"))?;
        let (width, height) = self.image_size;

        let (coords, labels) = self.preprocessor.prompt_tensors(points, width, height)?;
        let mask_input = Array4::<f32>::zeros((1, 1, MASK_INPUT_SIZE, MASK_INPUT_SIZE));
        let has_mask_input = Array1::<f32>::zeros(1);
        let orig_im_size = Array1::from(vec![height as f32, width as f32]);

        let (logits, mask_width, mask_height) = {
            let _infer_span = tracing::debug_span!("decoder").entered();
            let outputs = self
                .decoder
                .run(ort::inputs![
                    "image_embeddings" => Tensor::from_array(embedding)?,
                    "point_coords" => Tensor::from_array(coords)?,
                    "point_labels" => Tensor::from_array(labels)?,
                    "mask_input" => Tensor::from_array(mask_input)?,
                    "has_mask_input" => Tensor::from_array(has_mask_input)?,
                    "orig_im_size" => Tensor::from_array(orig_im_size)?
                ])
                .context("Failed to run mask decoder")?;

            // Masks are [1, N, H, W]; the first candidate is the prompt's mask
            let masks = outputs["masks"].try_extract_array::<f32>()?;
            let shape = masks.shape().to_vec();
            if shape.len() != 4 {
                return Err(anyhow!("Unexpected mask shape {:?}", shape));
            }
            let first = masks.slice(s![0, 0, .., ..]);
            let logits: Vec<f32> = first.iter().copied().collect();
            (logits, shape[3] as u32, shape[2] as u32)
        };

        Preprocessor::postprocess_mask(&logits, mask_width, mask_height, width, height)
    }

    fn reset_state(&mut self) {
        tracing::info!("Dropping SAM image embedding");
        self.embedding = None;
        self.image_size = (0, 0);
    }

    fn input_size(&self) -> (u32, u32) {
        let size = self.preprocessor.target_size();
        (size, size)
    }
}
