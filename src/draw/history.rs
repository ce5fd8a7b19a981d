use crate::draw::model::{ActiveStroke, Point, StrokePath, StrokeStyle};
use chrono::{DateTime, Utc};

/// Committed strokes in insertion order. Undo only ever removes the newest
/// stroke; there is no mid-list removal and no redo.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrokeHistory {
    strokes: Vec<StrokePath>,
}

impl StrokeHistory {
    pub fn commit(&mut self, stroke: StrokePath) {
        self.strokes.push(stroke);
    }

    pub fn undo(&mut self) -> Option<StrokePath> {
        self.strokes.pop()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    pub fn replace(&mut self, strokes: Vec<StrokePath>) {
        self.strokes = strokes;
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn strokes(&self) -> &[StrokePath] {
        &self.strokes
    }
}

/// One drawing surface: committed history plus the stroke being drawn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawingSurface {
    history: StrokeHistory,
    in_progress: Option<ActiveStroke>,
}

impl DrawingSurface {
    /// Starts a stroke, discarding any stroke that never received its release.
    pub fn begin(&mut self, start: Point, canvas_size: u32, style: StrokeStyle) {
        if self.in_progress.is_some() {
            tracing::trace!("replacing unreleased stroke");
        }
        self.in_progress = Some(ActiveStroke::begin(start, canvas_size, style));
    }

    /// Returns the previous point when the stroke grew, `None` when idle.
    pub fn extend(&mut self, point: Point) -> Option<Point> {
        let active = self.in_progress.as_mut()?;
        let last = active.last_point();
        active.append(point);
        last
    }

    pub fn commit(&mut self, committed_at: DateTime<Utc>) -> Option<StrokePath> {
        let stroke = self.in_progress.take()?.commit(committed_at);
        self.history.commit(stroke.clone());
        Some(stroke)
    }

    pub fn push(&mut self, stroke: StrokePath) {
        self.history.commit(stroke);
    }

    pub fn undo(&mut self) -> Option<StrokePath> {
        self.history.undo()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.in_progress = None;
    }

    pub fn replace(&mut self, strokes: Vec<StrokePath>) {
        self.history.replace(strokes);
        self.in_progress = None;
    }

    pub fn strokes(&self) -> &[StrokePath] {
        self.history.strokes()
    }

    pub fn in_progress(&self) -> Option<&ActiveStroke> {
        self.in_progress.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        self.in_progress.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.in_progress.is_none()
    }
}
