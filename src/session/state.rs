use super::points::PointSet;
use crate::segmentation::Mask;
use crate::worker::{ImageKey, RequestId};

/// Coarse session phase derived from the busy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Embedding,
    Ready,
    Segmenting,
}

/// What the outstanding worker request is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Embedding { image: ImageKey },
    Mask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub id: RequestId,
    pub kind: RequestKind,
}

/// Enabled state of the session's buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub clear: bool,
    pub undo: bool,
    pub download: bool,
}

/// Displayed size of the canvas widget, in widget pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Keep the width and derive the height from the image aspect ratio
    pub fn fit_to(&mut self, image_width: u32, image_height: u32) {
        if image_width == 0 {
            return;
        }
        self.height = self.width * image_height as f32 / image_width as f32;
    }

    /// Convert a widget-relative click into normalized coordinates
    ///
    /// Returns `None` when the click falls outside the widget box.
    pub fn normalize(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let nx = x / self.width;
        let ny = y / self.height;
        if !(0.0..=1.0).contains(&nx) || !(0.0..=1.0).contains(&ny) {
            return None;
        }
        Some((nx, ny))
    }
}

/// All mutable state of one segmentation session
#[derive(Debug, Default)]
pub struct SessionState {
    pub has_image: bool,
    pub is_embedding: bool,
    pub is_segmenting: bool,
    /// Image the worker has finished embedding
    pub current_image_url: String,
    /// Load number of that image
    pub current_load: u64,
    /// Image cached for export
    pub image_url: Option<String>,
    /// Latest mask, cached for export
    pub mask: Option<Mask>,
    pub points: PointSet,
    pub background_mode: bool,
    pub status: String,
    pub controls: Controls,
    pub in_flight: Option<InFlight>,
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        if self.is_embedding {
            Phase::Embedding
        } else if self.is_segmenting {
            Phase::Segmenting
        } else if self.has_image {
            Phase::Ready
        } else {
            Phase::Empty
        }
    }

    pub fn is_busy(&self) -> bool {
        self.is_embedding || self.is_segmenting
    }

    /// Forget the image, the points and every flag
    pub fn reset(&mut self) {
        self.has_image = false;
        self.is_embedding = false;
        self.is_segmenting = false;
        self.current_image_url.clear();
        self.current_load = 0;
        self.image_url = None;
        self.mask = None;
        self.points.clear();
        self.controls = Controls::default();
        self.in_flight = None;
    }

    /// Enable undo and download exactly when there are points to act on
    pub fn sync_point_controls(&mut self) {
        let has_points = !self.points.is_empty();
        self.controls.undo = has_points;
        self.controls.download = has_points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::points::Point;

    #[test]
    fn phase_follows_flags() {
        let mut state = SessionState::default();
        assert_eq!(state.phase(), Phase::Empty);

        state.has_image = true;
        state.is_embedding = true;
        assert_eq!(state.phase(), Phase::Embedding);

        state.is_embedding = false;
        assert_eq!(state.phase(), Phase::Ready);

        state.is_segmenting = true;
        assert_eq!(state.phase(), Phase::Segmenting);
        assert!(state.is_busy());
    }

    #[test]
    fn reset_clears_everything() {
        let mut state = SessionState {
            has_image: true,
            is_segmenting: true,
            current_image_url: "a.png".into(),
            current_load: 2,
            image_url: Some("a.png".into()),
            controls: Controls {
                clear: true,
                undo: true,
                download: true,
            },
            in_flight: Some(InFlight {
                id: 3,
                kind: RequestKind::Mask,
            }),
            ..Default::default()
        };
        state.points.toggle(Point::foreground(0.5, 0.5), 0.01);

        state.reset();

        assert_eq!(state.phase(), Phase::Empty);
        assert!(state.points.is_empty());
        assert!(state.current_image_url.is_empty());
        assert_eq!(state.current_load, 0);
        assert_eq!(state.image_url, None);
        assert_eq!(state.controls, Controls::default());
        assert_eq!(state.in_flight, None);
    }

    #[test]
    fn viewport_tracks_aspect_ratio() {
        let mut viewport = Viewport::new(400.0, 0.0);
        viewport.fit_to(200, 100);
        assert_eq!(viewport.height, 200.0);
    }

    #[test]
    fn viewport_normalizes_and_rejects_outside_clicks() {
        let viewport = Viewport::new(200.0, 100.0);
        assert_eq!(viewport.normalize(100.0, 25.0), Some((0.5, 0.25)));
        assert_eq!(viewport.normalize(201.0, 25.0), None);
        assert_eq!(viewport.normalize(-1.0, 25.0), None);
    }
}
