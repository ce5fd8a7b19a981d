use crate::draw::history::DrawingSurface;
use crate::draw::model::{Color, Point, StrokePath, StrokeStyle};
use crate::draw::render::{draw_segment_update, render_layers, DirtyRect, RgbaCanvas};
use crate::draw::snapshot;
use crate::protocol::message::Outbound;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

pub const CANVAS_BACKGROUND: Color = Color::rgba(255, 255, 255, 255);

/// Owns the local drawing surface and the read-only mirror of strokes that
/// arrived from other devices. Both are composited onto one canvas: mirror
/// strokes first, local strokes on top, then the stroke being drawn.
///
/// Every commit, undo and clear re-renders the canvas exactly once; pointer
/// moves only stamp the newest segment.
#[derive(Debug, Clone)]
pub struct DrawingCapture {
    canvas_size: u32,
    brush: StrokeStyle,
    width_range: RangeInclusive<u32>,
    local: DrawingSurface,
    mirror: DrawingSurface,
    multi_author: bool,
    canvas: RgbaCanvas,
    render_count: u64,
    submitted: bool,
    title: String,
}

impl DrawingCapture {
    pub fn new(canvas_size: u32, brush: StrokeStyle, width_range: RangeInclusive<u32>) -> Self {
        let mut capture = Self {
            canvas_size,
            brush,
            width_range,
            local: DrawingSurface::default(),
            mirror: DrawingSurface::default(),
            multi_author: false,
            canvas: RgbaCanvas::new(canvas_size, canvas_size, CANVAS_BACKGROUND),
            render_count: 0,
            submitted: false,
            title: String::new(),
        };
        let width = capture.brush.line_width;
        capture.brush.line_width = capture.clamp_width(width);
        capture
    }

    pub fn begin_stroke(&mut self, position: Point) {
        self.local.begin(position, self.canvas_size, self.brush);
        draw_segment_update(
            &mut self.canvas,
            position,
            position,
            self.canvas_size,
            &self.brush,
        );
    }

    /// Grows the active stroke and returns the canvas region that changed.
    /// Moves that arrive before a press are dropped.
    pub fn extend_stroke(&mut self, position: Point) -> Option<DirtyRect> {
        let Some(previous) = self.local.extend(position) else {
            tracing::trace!(x = position.0, y = position.1, "move without active stroke");
            return None;
        };
        let style = self.local.in_progress().map(|s| *s.style()).unwrap_or(self.brush);
        draw_segment_update(&mut self.canvas, previous, position, self.canvas_size, &style);
        let pad = (style.line_width / 2 + 1) as i32;
        DirtyRect::from_points(previous, position, pad).clamp(self.canvas.width(), self.canvas.height())
    }

    /// Commits the active stroke and builds the PATH message for it. The
    /// snapshot covers the whole composited canvas.
    pub fn end_stroke(&mut self, now: DateTime<Utc>) -> Option<Outbound> {
        let Some(path) = self.local.commit(now) else {
            tracing::trace!("release without active stroke");
            return None;
        };
        self.rerender();
        let data_uri = self.snapshot_or_empty();
        Some(Outbound::Path { path, data_uri })
    }

    pub fn can_undo(&self) -> bool {
        !self.multi_author && !self.local.strokes().is_empty()
    }

    pub fn undo(&mut self) -> bool {
        if self.multi_author {
            tracing::trace!("undo disabled on a shared surface");
            return false;
        }
        if self.local.undo().is_none() {
            tracing::trace!("undo with no committed strokes");
            return false;
        }
        self.rerender();
        true
    }

    /// Wipes the local strokes. On a shared surface the mirror goes too,
    /// since every author's canvas clears on the resulting CLEAR.
    pub fn clear(&mut self) -> Outbound {
        self.local.clear();
        if self.multi_author {
            self.mirror.clear();
        }
        self.rerender();
        Outbound::Clear
    }

    pub fn apply_remote_path(&mut self, path: StrokePath) {
        self.mirror.push(path);
        self.rerender();
    }

    pub fn apply_remote_clear(&mut self) {
        self.mirror.clear();
        if self.multi_author {
            self.local.clear();
        }
        self.rerender();
    }

    pub fn resync_mirror(&mut self, paths: Vec<StrokePath>) {
        self.mirror.replace(paths);
        self.rerender();
    }

    /// Drops everything drawn in the previous phase.
    pub fn reset_for_phase(&mut self, multi_author: bool) {
        self.local.clear();
        self.mirror.clear();
        self.multi_author = multi_author;
        self.submitted = false;
        self.title.clear();
        self.rerender();
    }

    /// Builds the IMAGE message for the finished artwork.
    pub fn submit(&mut self, title: &str, max_len: usize) -> Result<Outbound> {
        let title = title.trim();
        let len = title.chars().count();
        if len > max_len {
            bail!("title is {len} characters, the limit is {max_len}");
        }
        let data_uri = self.snapshot()?;
        self.title = title.to_string();
        self.submitted = true;
        Ok(Outbound::Image {
            data_uri,
            title: self.title.clone(),
        })
    }

    pub fn snapshot(&self) -> Result<String> {
        snapshot::data_uri(&self.canvas)
    }

    fn snapshot_or_empty(&self) -> String {
        match self.snapshot() {
            Ok(uri) => uri,
            Err(err) => {
                tracing::error!(error = %err, "failed to snapshot canvas");
                String::new()
            }
        }
    }

    pub fn set_brush_color(&mut self, hex: &str) -> bool {
        match Color::parse_hex(hex) {
            Some(color) => {
                self.brush.color = color;
                true
            }
            None => {
                tracing::warn!(%hex, "ignoring invalid brush colour");
                false
            }
        }
    }

    pub fn set_brush_width(&mut self, width: u32) -> u32 {
        self.brush.line_width = self.clamp_width(width);
        self.brush.line_width
    }

    fn clamp_width(&self, width: u32) -> u32 {
        width.clamp(*self.width_range.start(), *self.width_range.end())
    }

    fn rerender(&mut self) {
        render_layers(&[&self.mirror, &self.local], &mut self.canvas);
        self.render_count += 1;
    }

    pub fn brush(&self) -> &StrokeStyle {
        &self.brush
    }

    pub fn canvas_size(&self) -> u32 {
        self.canvas_size
    }

    pub fn local_strokes(&self) -> &[StrokePath] {
        self.local.strokes()
    }

    pub fn mirror_strokes(&self) -> &[StrokePath] {
        self.mirror.strokes()
    }

    pub fn is_drawing(&self) -> bool {
        self.local.is_drawing()
    }

    pub fn is_multi_author(&self) -> bool {
        self.multi_author
    }

    pub fn canvas(&self) -> &RgbaCanvas {
        &self.canvas
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}
