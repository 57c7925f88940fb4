use std::sync::Arc;

use image::{RgbImage, RgbaImage};

use super::points::{toggle_threshold, Point, PointEdit};
use super::state::{InFlight, Phase, RequestKind, SessionState, Viewport};
use super::SessionError;
use crate::compositor::{self, CompositeError, Compositor, OverlayStyle};
use crate::segmentation::{ModelCatalog, ModelSpec, DEFAULT_MODEL_ID};
use crate::source::ImageSource;
use crate::worker::{ImageKey, InferenceGateway, RequestId, WorkerEvent};

/// Why an input was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoImage,
    Busy,
    NoPoints,
    OutsideCanvas,
}

/// What an input did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Accepted, with the worker request it started if any
    Applied(Option<RequestId>),
    Ignored(IgnoreReason),
}

/// Drives one segmentation session
///
/// Owns the session state, the canvases and the gateway to the inference
/// worker. At most one worker request is outstanding; inputs that would
/// start another are ignored, and events for any other request id are
/// dropped.
pub struct SessionController {
    gateway: InferenceGateway,
    catalog: ModelCatalog,
    model_id: String,
    state: SessionState,
    compositor: Compositor,
    viewport: Viewport,
    fixed_viewport_width: Option<f32>,
    image: Option<Arc<RgbImage>>,
    loads: u64,
}

impl SessionController {
    pub fn new(gateway: InferenceGateway, catalog: ModelCatalog) -> Self {
        Self {
            gateway,
            catalog,
            model_id: DEFAULT_MODEL_ID.to_string(),
            state: SessionState::default(),
            compositor: Compositor::new(OverlayStyle::default()),
            viewport: Viewport::new(0.0, 0.0),
            fixed_viewport_width: None,
            image: None,
            loads: 0,
        }
    }

    /// Display images at this widget width instead of their natural width
    pub fn with_viewport_width(mut self, width: f32) -> Self {
        self.fixed_viewport_width = Some(width);
        self.viewport.width = width;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn select_model(&mut self, id: &str) -> Result<(), SessionError> {
        if !self.catalog.contains(id) {
            return Err(SessionError::UnknownModel(id.to_string()));
        }
        tracing::info!("Using model {}", id);
        self.model_id = id.to_string();
        Ok(())
    }

    fn model_spec(&self) -> Result<ModelSpec, SessionError> {
        self.catalog
            .resolve(&self.model_id)
            .ok_or_else(|| SessionError::UnknownModel(self.model_id.clone()))
    }

    /// Replace the session image and request its embedding
    ///
    /// `reset_mode` puts the point mode back to foreground, as picking or
    /// dropping a file does.
    pub fn load_image(
        &mut self,
        source: &dyn ImageSource,
        reset_mode: bool,
    ) -> Result<Outcome, SessionError> {
        if self.state.is_busy() {
            tracing::debug!("Ignoring image load while busy");
            return Ok(Outcome::Ignored(IgnoreReason::Busy));
        }

        let url = source.url();
        let image = Arc::new(source.load()?);
        self.loads += 1;
        let key = ImageKey {
            url: url.clone(),
            load: self.loads,
        };

        self.reset_canvas();
        self.compositor.draw_image(&image)?;
        let (width, height) = image.dimensions();
        if self.fixed_viewport_width.is_none() {
            self.viewport.width = width as f32;
        }
        self.viewport.fit_to(width, height);

        self.state.has_image = true;
        self.state.controls.clear = true;
        self.state.image_url = Some(url.clone());
        self.image = Some(image.clone());
        if reset_mode {
            self.state.background_mode = false;
        }

        tracing::info!("Loaded {} ({}x{})", url, width, height);

        let model = self.model_spec()?;
        self.state.is_embedding = true;
        self.state.controls.clear = false;
        match self.gateway.request_embedding(model, &key, image) {
            Ok(id) => {
                self.state.in_flight = Some(InFlight {
                    id,
                    kind: RequestKind::Embedding { image: key },
                });
                Ok(Outcome::Applied(Some(id)))
            }
            Err(err) => {
                self.state.is_embedding = false;
                self.state.controls.clear = true;
                Err(err.into())
            }
        }
    }

    /// Handle a click at widget coordinates `(x, y)`
    ///
    /// `invert` is the modifier key: it flips the point mode for this click.
    pub fn click(&mut self, x: f32, y: f32, invert: bool) -> Result<Outcome, SessionError> {
        if !self.state.has_image {
            return Ok(Outcome::Ignored(IgnoreReason::NoImage));
        }
        if self.state.is_busy() {
            tracing::debug!("Ignoring click while busy");
            return Ok(Outcome::Ignored(IgnoreReason::Busy));
        }
        let Some((nx, ny)) = self.viewport.normalize(x, y) else {
            return Ok(Outcome::Ignored(IgnoreReason::OutsideCanvas));
        };

        let background = invert != self.state.background_mode;
        let threshold = toggle_threshold(self.viewport.width);
        match self.state.points.toggle(Point::new(nx, ny, !background), threshold) {
            PointEdit::Added(point) => tracing::debug!("Added point {:?}", point),
            PointEdit::Removed(removed) => tracing::debug!("Removed {} point(s)", removed.len()),
        }

        self.after_points_changed()
    }

    /// Remove the most recent point
    pub fn undo(&mut self) -> Result<Outcome, SessionError> {
        if !self.state.has_image {
            return Ok(Outcome::Ignored(IgnoreReason::NoImage));
        }
        if self.state.is_busy() {
            return Ok(Outcome::Ignored(IgnoreReason::Busy));
        }
        if self.state.points.undo().is_none() {
            return Ok(Outcome::Ignored(IgnoreReason::NoPoints));
        }

        self.after_points_changed()
    }

    fn after_points_changed(&mut self) -> Result<Outcome, SessionError> {
        self.state.sync_point_controls();

        if self.state.points.is_empty() {
            self.compositor.clear_mask();
            self.state.mask = None;
            return Ok(Outcome::Applied(None));
        }

        let id = self.request_mask()?;
        Ok(Outcome::Applied(Some(id)))
    }

    fn request_mask(&mut self) -> Result<RequestId, SessionError> {
        let image = self
            .image
            .clone()
            .ok_or(SessionError::Composite(CompositeError::MissingImage))?;
        let model = self.model_spec()?;
        let points = self.state.points.to_vec();
        let key = ImageKey {
            url: self.state.current_image_url.clone(),
            load: self.state.current_load,
        };

        self.state.is_segmenting = true;
        match self.gateway.request_mask(model, &key, image, points) {
            Ok(id) => {
                self.state.in_flight = Some(InFlight {
                    id,
                    kind: RequestKind::Mask,
                });
                Ok(id)
            }
            Err(err) => {
                self.state.is_segmenting = false;
                Err(err.into())
            }
        }
    }

    /// Flip background-point mode, or set it explicitly
    pub fn toggle_point_mode(&mut self, mode: Option<bool>) -> bool {
        self.state.background_mode = mode.unwrap_or(!self.state.background_mode);
        tracing::info!(
            "Point mode: {}",
            if self.state.background_mode {
                "background"
            } else {
                "mask"
            }
        );
        self.state.background_mode
    }

    /// Drop the image, points and mask, and return to foreground mode
    ///
    /// Ignored while an embedding is running. A mask request still in flight
    /// is forgotten and its response dropped.
    pub fn clear(&mut self) -> Outcome {
        if self.state.is_embedding {
            return Outcome::Ignored(IgnoreReason::Busy);
        }
        self.reset_canvas();
        self.state.background_mode = false;
        Outcome::Applied(None)
    }

    fn reset_canvas(&mut self) {
        self.compositor.clear();
        self.state.reset();
        self.image = None;
        if self.fixed_viewport_width.is_none() {
            self.viewport.width = 0.0;
        }
        self.viewport.height = 0.0;
    }

    /// Change the displayed width; the height follows the image aspect ratio
    pub fn resize(&mut self, width: f32) {
        self.fixed_viewport_width = Some(width);
        self.viewport.width = width;
        if let Some(image) = &self.image {
            self.viewport.fit_to(image.width(), image.height());
        }
        tracing::debug!("Viewport resized to {:?}", self.viewport);
    }

    /// Apply every event that is already waiting
    pub fn pump(&mut self) -> Result<(), SessionError> {
        while let Some(event) = self.gateway.try_next_event()? {
            self.handle_event(event)?;
        }
        Ok(())
    }

    /// Block until the outstanding request, if any, has finished
    pub fn wait(&mut self) -> Result<(), SessionError> {
        while self.state.in_flight.is_some() {
            let event = self.gateway.next_event()?;
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: WorkerEvent) -> Result<(), SessionError> {
        let id = event.id();
        if self.state.in_flight.as_ref().map(|f| f.id) != Some(id) {
            tracing::debug!("Dropping event for stale request {}", id);
            return Ok(());
        }

        match event {
            WorkerEvent::Status { message, .. } => {
                tracing::info!("{}", message);
                self.state.status = message;
            }
            WorkerEvent::CompleteEmbedding { .. } => {
                if let Some(InFlight {
                    kind: RequestKind::Embedding { image },
                    ..
                }) = self.state.in_flight.take()
                {
                    self.state.current_image_url = image.url;
                    self.state.current_load = image.load;
                }
                self.state.is_embedding = false;
                self.state.controls.clear = true;
                self.state.status = "Ready".to_string();
                tracing::info!("Embedding ready for {}", self.state.current_image_url);
            }
            WorkerEvent::Complete { mask, .. } => {
                self.state.in_flight = None;
                self.state.is_segmenting = false;
                self.compositor.draw_mask(&mask, self.state.points.as_slice())?;
                self.state.mask = Some(mask);
            }
            WorkerEvent::Error { message, .. } => {
                let kind = self.state.in_flight.take().map(|f| f.kind);
                self.state.is_embedding = false;
                self.state.is_segmenting = false;
                self.state.controls.clear = self.state.has_image;
                self.state.status = message.clone();

                if let Some(RequestKind::Embedding { .. }) = kind {
                    return Err(SessionError::Embedding(message));
                }
                tracing::error!("Segmentation failed: {}", message);
            }
        }
        Ok(())
    }

    /// Cut the masked region out of the original image
    pub fn export(&self) -> Result<RgbaImage, SessionError> {
        if !self.state.controls.download {
            return Err(SessionError::DownloadDisabled);
        }
        let image = self.image.as_ref().ok_or(CompositeError::MissingImage)?;
        let mask = self.state.mask.as_ref().ok_or(CompositeError::MissingMask)?;
        Ok(compositor::cutout(image, mask)?)
    }

    /// Base canvas with the mask overlay flattened on top
    pub fn preview(&self) -> Result<RgbaImage, SessionError> {
        Ok(self.compositor.preview()?)
    }
}
