use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use image::RgbImage;

use super::protocol::{ImageKey, RequestId, WorkerEvent, WorkerRequest};
use super::runner::InferenceWorker;
use super::GatewayError;
use crate::segmentation::{ModelFactory, ModelSpec};
use crate::session::Point;

/// Typed request/response front of the inference worker thread
///
/// Every request gets a fresh [`RequestId`]; events coming back carry it so
/// the caller can match responses to requests and drop stale ones.
pub struct InferenceGateway {
    requests: Option<Sender<WorkerRequest>>,
    events: Receiver<WorkerEvent>,
    next_id: RequestId,
    worker: Option<JoinHandle<()>>,
}

impl InferenceGateway {
    /// Start the worker thread
    pub fn spawn(factory: Box<dyn ModelFactory>) -> Result<Self, GatewayError> {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();

        // Models are created and used on the worker thread only
        let handle = thread::Builder::new()
            .name("inference-worker".into())
            .spawn(move || InferenceWorker::new(factory).run(request_rx, event_tx))
            .map_err(GatewayError::Spawn)?;

        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            next_id: 1,
            worker: Some(handle),
        })
    }

    /// Gateway over caller-owned channels, with no worker thread
    #[cfg(test)]
    pub fn from_channels(requests: Sender<WorkerRequest>, events: Receiver<WorkerEvent>) -> Self {
        Self {
            requests: Some(requests),
            events,
            next_id: 1,
            worker: None,
        }
    }

    pub fn request_embedding(
        &mut self,
        model: ModelSpec,
        key: &ImageKey,
        image: Arc<RgbImage>,
    ) -> Result<RequestId, GatewayError> {
        self.submit(model, key, image, None)
    }

    pub fn request_mask(
        &mut self,
        model: ModelSpec,
        key: &ImageKey,
        image: Arc<RgbImage>,
        points: Vec<Point>,
    ) -> Result<RequestId, GatewayError> {
        if points.is_empty() {
            return Err(GatewayError::EmptyPrompt);
        }
        self.submit(model, key, image, Some(points))
    }

    fn submit(
        &mut self,
        model: ModelSpec,
        key: &ImageKey,
        image: Arc<RgbImage>,
        points: Option<Vec<Point>>,
    ) -> Result<RequestId, GatewayError> {
        let id = self.next_id;
        self.next_id += 1;

        tracing::debug!(
            "Submitting request {} (model={}, image={}#{}, points={})",
            id,
            model.id,
            key.url,
            key.load,
            points.as_ref().map_or(0, Vec::len)
        );

        let request = WorkerRequest {
            id,
            model,
            key: key.clone(),
            image,
            points,
        };
        self.requests
            .as_ref()
            .ok_or(GatewayError::Disconnected)?
            .send(request)
            .map_err(|_| GatewayError::Disconnected)?;
        Ok(id)
    }

    /// Next event if one is ready
    pub fn try_next_event(&self) -> Result<Option<WorkerEvent>, GatewayError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(GatewayError::Disconnected),
        }
    }

    /// Block until the next event
    pub fn next_event(&self) -> Result<WorkerEvent, GatewayError> {
        self.events.recv().map_err(|_| GatewayError::Disconnected)
    }
}

impl Drop for InferenceGateway {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Inference worker panicked");
            }
        }
    }
}
