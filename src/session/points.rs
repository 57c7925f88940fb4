/// Click radius, in widget pixels, inside which a click removes an existing point
pub const TOGGLE_RADIUS_PX: f32 = 6.0;

/// A prompt point in normalized image coordinates
///
/// `x` and `y` lie in [0, 1] relative to the image width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub is_foreground: bool,
}

impl Point {
    pub fn new(x: f32, y: f32, is_foreground: bool) -> Self {
        Self { x, y, is_foreground }
    }

    pub fn foreground(x: f32, y: f32) -> Self {
        Self::new(x, y, true)
    }

    pub fn background(x: f32, y: f32) -> Self {
        Self::new(x, y, false)
    }

    /// Euclidean distance in normalized space
    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        (dx * dx + dy * dy).sqrt()
    }

    /// The `[x, y, is_foreground]` triple sent to the worker
    pub fn as_triple(&self) -> (f32, f32, bool) {
        (self.x, self.y, self.is_foreground)
    }
}

/// Result of applying a click to a [`PointSet`]
#[derive(Debug, Clone, PartialEq)]
pub enum PointEdit {
    Added(Point),
    /// Every point within the toggle radius, in their original order
    Removed(Vec<Point>),
}

/// Prompt points in click order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Point>,
}

impl PointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Point> {
        self.points.clone()
    }

    /// Add a point, or remove the points it lands on
    ///
    /// A point counts as hit when its normalized distance to the click is
    /// strictly below `threshold`. All hit points are removed and nothing is
    /// added; otherwise the new point is appended.
    pub fn toggle(&mut self, point: Point, threshold: f32) -> PointEdit {
        let (hit, kept): (Vec<Point>, Vec<Point>) = self
            .points
            .iter()
            .partition(|existing| existing.distance_to(point.x, point.y) < threshold);

        if hit.is_empty() {
            self.points.push(point);
            PointEdit::Added(point)
        } else {
            self.points = kept;
            PointEdit::Removed(hit)
        }
    }

    /// Remove the most recently added point
    pub fn undo(&mut self) -> Option<Point> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Normalized toggle threshold for a widget of the given width
pub fn toggle_threshold(widget_width: f32) -> f32 {
    TOGGLE_RADIUS_PX / widget_width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_appends_distant_points_in_click_order() {
        let mut set = PointSet::new();
        let threshold = toggle_threshold(100.0);

        set.toggle(Point::foreground(0.1, 0.1), threshold);
        set.toggle(Point::background(0.9, 0.9), threshold);

        assert_eq!(
            set.as_slice(),
            &[Point::foreground(0.1, 0.1), Point::background(0.9, 0.9)]
        );
    }

    #[test]
    fn toggle_near_existing_point_removes_instead_of_duplicating() {
        let mut set = PointSet::new();
        let threshold = toggle_threshold(100.0);
        set.toggle(Point::foreground(0.5, 0.5), threshold);

        let edit = set.toggle(Point::foreground(0.53, 0.5), threshold);

        assert_eq!(edit, PointEdit::Removed(vec![Point::foreground(0.5, 0.5)]));
        assert!(set.is_empty());
    }

    #[test]
    fn toggle_threshold_is_exclusive() {
        let mut set = PointSet::new();
        // 0.5 is exactly representable, so the distance is exactly 0.5
        set.toggle(Point::foreground(0.0, 0.0), 0.5);

        let edit = set.toggle(Point::foreground(0.5, 0.0), 0.5);

        assert!(matches!(edit, PointEdit::Added(_)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn toggle_removes_every_point_within_radius() {
        let mut set = PointSet::new();
        set.toggle(Point::foreground(0.50, 0.50), 0.001);
        set.toggle(Point::background(0.52, 0.50), 0.001);
        set.toggle(Point::foreground(0.90, 0.90), 0.001);

        let edit = set.toggle(Point::foreground(0.51, 0.50), 0.05);

        match edit {
            PointEdit::Removed(removed) => assert_eq!(removed.len(), 2),
            other => panic!("expected removal, got {other:?}"),
        }
        assert_eq!(set.as_slice(), &[Point::foreground(0.90, 0.90)]);
    }

    #[test]
    fn threshold_scales_with_widget_width() {
        assert!((toggle_threshold(600.0) - 0.01).abs() < f32::EPSILON);
        assert!(toggle_threshold(1200.0) < toggle_threshold(600.0));
    }

    #[test]
    fn undo_pops_most_recent() {
        let mut set = PointSet::new();
        set.toggle(Point::foreground(0.1, 0.1), 0.01);
        set.toggle(Point::background(0.2, 0.2), 0.01);

        assert_eq!(set.undo(), Some(Point::background(0.2, 0.2)));
        assert_eq!(set.undo(), Some(Point::foreground(0.1, 0.1)));
        assert_eq!(set.undo(), None);
    }
}
