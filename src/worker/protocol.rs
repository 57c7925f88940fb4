use std::sync::Arc;

use image::RgbImage;

use crate::segmentation::{Mask, ModelSpec};
use crate::session::Point;

/// Correlation id tying worker events to the request that caused them
pub type RequestId = u64;

/// Identity of one loaded image
///
/// `load` grows with every image load, so reopening the same location after
/// its content changed gives a different key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageKey {
    pub url: String,
    pub load: u64,
}

/// One request to the inference worker
///
/// Without points this asks for an embedding only; with points it asks for
/// a mask (embedding the image first if this model has not seen it).
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub id: RequestId,
    pub model: ModelSpec,
    pub key: ImageKey,
    pub image: Arc<RgbImage>,
    pub points: Option<Vec<Point>>,
}

/// Event emitted by the worker for a request
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Status { id: RequestId, message: String },
    CompleteEmbedding { id: RequestId },
    Complete { id: RequestId, mask: Mask },
    Error { id: RequestId, message: String },
}

impl WorkerEvent {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Status { id, .. }
            | Self::CompleteEmbedding { id }
            | Self::Complete { id, .. }
            | Self::Error { id, .. } => *id,
        }
    }
}
