use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};

use anyhow::{bail, Context, Result};

use super::protocol::{ImageKey, RequestId, WorkerEvent, WorkerRequest};
use crate::segmentation::{ModelFactory, SegmentationModel};

struct LoadedModel {
    model: Box<dyn SegmentationModel>,
    embedded: Option<ImageKey>,
}

/// Inference loop owning every loaded model
///
/// Models are created lazily, one per model id, and each remembers which
/// image load it last embedded so repeated requests skip the encoder.
pub(super) struct InferenceWorker {
    factory: Box<dyn ModelFactory>,
    models: HashMap<String, LoadedModel>,
}

impl InferenceWorker {
    pub(super) fn new(factory: Box<dyn ModelFactory>) -> Self {
        Self {
            factory,
            models: HashMap::new(),
        }
    }

    /// Serve requests until the request channel closes
    pub(super) fn run(mut self, requests: Receiver<WorkerRequest>, events: Sender<WorkerEvent>) {
        tracing::debug!("Inference worker started");

        for request in requests {
            let id = request.id;
            let event = match self.handle(&request, &events) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!("Request {} failed: {:#}", id, err);
                    WorkerEvent::Error {
                        id,
                        message: format!("{err:#}"),
                    }
                }
            };
            if events.send(event).is_err() {
                break;
            }
        }

        tracing::debug!("Inference worker stopped");
    }

    fn handle(&mut self, request: &WorkerRequest, events: &Sender<WorkerEvent>) -> Result<WorkerEvent> {
        let id = request.id;
        let _span = tracing::debug_span!("request", id).entered();

        if !self.models.contains_key(&request.model.id) {
            status(events, id, "Loading model");
            let model = self
                .factory
                .create(&request.model)
                .with_context(|| format!("Failed to load model {}", request.model.id))?;
            tracing::debug!("Model {} input size: {:?}", request.model.id, model.input_size());
            self.models.insert(
                request.model.id.clone(),
                LoadedModel {
                    model,
                    embedded: None,
                },
            );
        }
        let Some(loaded) = self.models.get_mut(&request.model.id) else {
            bail!("Model {} is not loaded", request.model.id);
        };

        if loaded.embedded.as_ref() != Some(&request.key) {
            status(events, id, "Embedding image");
            loaded.embedded = None;
            loaded.model.reset_state();
            loaded
                .model
                .embed(&request.image)
                .context("Failed to embed image")?;
            loaded.embedded = Some(request.key.clone());
            status(events, id, "Embedding done");
        }

        let Some(points) = &request.points else {
            return Ok(WorkerEvent::CompleteEmbedding { id });
        };
        if points.is_empty() {
            bail!("Mask requested without prompt points");
        }

        status(events, id, "Segmenting");
        let mask = loaded
            .model
            .segment(points)
            .context("Failed to segment image")?;
        status(events, id, "Segmentation complete");

        Ok(WorkerEvent::Complete { id, mask })
    }
}

fn status(events: &Sender<WorkerEvent>, id: RequestId, message: &str) {
    let _ = events.send(WorkerEvent::Status {
        id,
        message: message.to_string(),
    });
}
