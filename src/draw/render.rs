use crate::draw::history::DrawingSurface;
use crate::draw::model::{Color, LineCap, Point, StrokePath, StrokeStyle};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

const WIDE_STROKE_THRESHOLD: u32 = 14;
// Keeps brush masks small enough that radius squared fits an i32.
const MAX_BRUSH_WIDTH: u32 = 1 << 14;

/// Anything strokes can be replayed onto.
pub trait DrawTarget {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self);
    fn stroke_polyline(&mut self, points: &[Point], style: &StrokeStyle);
}

/// Replays `surface` from scratch: committed strokes in insertion order,
/// then the in-progress stroke on top. An empty surface just clears.
pub fn render(surface: &DrawingSurface, target: &mut impl DrawTarget) {
    render_layers(&[surface], target);
}

/// Like [`render`] for several surfaces sharing one target. Committed
/// strokes of every layer are drawn before any in-progress stroke.
pub fn render_layers(layers: &[&DrawingSurface], target: &mut impl DrawTarget) {
    target.clear();
    for layer in layers {
        for stroke in layer.strokes() {
            draw_stroke(target, stroke);
        }
    }
    for layer in layers {
        if let Some(active) = layer.in_progress() {
            draw_points(target, active.points(), active.canvas_size(), active.style());
        }
    }
}

pub fn draw_stroke(target: &mut impl DrawTarget, stroke: &StrokePath) {
    draw_points(target, stroke.points(), stroke.canvas_size(), stroke.style());
}

/// Draws only the newest segment of a growing stroke, without clearing.
pub fn draw_segment_update(
    target: &mut impl DrawTarget,
    from: Point,
    to: Point,
    canvas_size: u32,
    style: &StrokeStyle,
) {
    draw_points(target, &[from, to], canvas_size, style);
}

fn draw_points(
    target: &mut impl DrawTarget,
    points: &[Point],
    canvas_size: u32,
    style: &StrokeStyle,
) {
    if points.is_empty() {
        return;
    }
    let factor = scale_factor(target.size(), canvas_size);
    if (factor - 1.0).abs() <= f32::EPSILON {
        target.stroke_polyline(points, style);
        return;
    }
    let scaled: Vec<Point> = points.iter().map(|p| p.scaled(factor)).collect();
    let style = StrokeStyle {
        line_width: ((style.line_width as f32) * factor).round().max(1.0) as u32,
        ..*style
    };
    target.stroke_polyline(&scaled, &style);
}

fn scale_factor(target_size: (u32, u32), canvas_size: u32) -> f32 {
    if canvas_size == 0 || target_size.0 == 0 {
        return 1.0;
    }
    target_size.0 as f32 / canvas_size as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DirtyRect {
    pub fn from_points(a: Point, b: Point, pad: i32) -> Self {
        let min_x = a.0.min(b.0).saturating_sub(pad);
        let max_x = a.0.max(b.0).saturating_add(pad);
        let min_y = a.1.min(b.1).saturating_sub(pad);
        let max_y = a.1.max(b.1).saturating_add(pad);
        let span = |lo: i32, hi: i32| (hi as i64 - lo as i64 + 1).clamp(1, i32::MAX as i64) as i32;
        Self {
            x: min_x,
            y: min_y,
            width: span(min_x, max_x),
            height: span(min_y, max_y),
        }
    }

    pub fn clamp(self, width: u32, height: u32) -> Option<DirtyRect> {
        let max_w = width.min(i32::MAX as u32) as i32;
        let max_h = height.min(i32::MAX as u32) as i32;
        let x0 = self.x.clamp(0, max_w);
        let y0 = self.y.clamp(0, max_h);
        let x1 = self.x.saturating_add(self.width).clamp(0, max_w);
        let y1 = self.y.saturating_add(self.height).clamp(0, max_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(DirtyRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Software RGBA surface, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaCanvas {
    width: u32,
    height: u32,
    background: Color,
    pixels: Vec<u8>,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let mut canvas = Self {
            width,
            height,
            background,
            pixels: vec![0u8; (width as usize) * (height as usize) * 4],
        };
        canvas.clear();
        canvas
    }

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width as usize) * (height as usize) * 4);
        Self {
            width,
            height,
            background: Color::TRANSPARENT,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let idx = ((y * self.width + x) * 4) as usize;
        Color::rgba(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        )
    }

    pub fn painted_pixels(&self) -> usize {
        let bg = [
            self.background.r,
            self.background.g,
            self.background.b,
            self.background.a,
        ];
        self.pixels.chunks_exact(4).filter(|px| *px != bg).count()
    }
}

impl DrawTarget for RgbaCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        let bg = self.background;
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[bg.r, bg.g, bg.b, bg.a]);
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], style: &StrokeStyle) {
        draw_polyline(points, style, &mut self.pixels, self.width, self.height);
    }
}

fn draw_polyline(points: &[Point], style: &StrokeStyle, pixels: &mut [u8], width: u32, height: u32) {
    let stroke_width = style.line_width.clamp(1, max_brush_width(width, height));
    let brush = BrushShape::for_cap(style.line_cap);
    if points.len() == 1 {
        draw_brush(points[0], style.color, stroke_width, brush, pixels, width, height);
        return;
    }

    let pad = (stroke_width / 2 + 1) as i64;
    for segment in points.windows(2) {
        let Some((start, end)) = clip_segment(segment[0], segment[1], pad, width, height) else {
            continue;
        };
        if stroke_width >= WIDE_STROKE_THRESHOLD && brush == BrushShape::Disc {
            draw_segment_capsule(
                start,
                end,
                style.color,
                stroke_width,
                pixels,
                width,
                height,
            );
        } else {
            draw_segment_stamped(
                start,
                end,
                style.color,
                stroke_width,
                brush,
                pixels,
                width,
                height,
            );
        }
    }
}

/// A brush wider than twice the canvas perimeter paints the same pixels as
/// one that is exactly that wide.
fn max_brush_width(width: u32, height: u32) -> u32 {
    width
        .saturating_add(height)
        .saturating_mul(2)
        .saturating_add(1)
        .min(MAX_BRUSH_WIDTH)
}

/// Cuts a segment down to the canvas grown by `pad` on every side
/// (Liang-Barsky). Segments already inside come back untouched.
fn clip_segment(start: Point, end: Point, pad: i64, width: u32, height: u32) -> Option<(Point, Point)> {
    let (x_min, y_min) = (-pad, -pad);
    let (x_max, y_max) = (width as i64 - 1 + pad, height as i64 - 1 + pad);
    let inside = |p: Point| {
        (x_min..=x_max).contains(&(p.0 as i64)) && (y_min..=y_max).contains(&(p.1 as i64))
    };
    if inside(start) && inside(end) {
        return Some((start, end));
    }

    let (x0, y0) = (start.0 as f64, start.1 as f64);
    let (dx, dy) = (end.0 as f64 - x0, end.1 as f64 - y0);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    let edges = [
        (-dx, x0 - x_min as f64),
        (dx, x_max as f64 - x0),
        (-dy, y0 - y_min as f64),
        (dy, y_max as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    let at = |t: f64| Point((x0 + dx * t).round() as i32, (y0 + dy * t).round() as i32);
    Some((at(t0), at(t1)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrushShape {
    Disc,
    Square,
}

impl BrushShape {
    fn for_cap(cap: LineCap) -> Self {
        match cap {
            LineCap::Round => BrushShape::Disc,
            LineCap::Butt | LineCap::Square => BrushShape::Square,
        }
    }
}

fn draw_segment_stamped(
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
    brush: BrushShape,
    pixels: &mut [u8],
    width: u32,
    height: u32,
) {
    let mut x0 = start.0 as i64;
    let mut y0 = start.1 as i64;
    let x1 = end.0 as i64;
    let y1 = end.1 as i64;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        // Both ends come from i32 points, so every step stays in range.
        let at = Point(x0 as i32, y0 as i32);
        draw_brush(at, color, stroke_width, brush, pixels, width, height);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_segment_capsule(
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
    pixels: &mut [u8],
    width: u32,
    height: u32,
) {
    let radius = (stroke_width.saturating_sub(1) / 2) as f32;
    let pad = radius.ceil() as i32 + 1;
    let Some(clip) = DirtyRect::from_points(start, end, pad).clamp(width, height) else {
        return;
    };

    let radius_sq = radius * radius;
    for y in clip.y..(clip.y + clip.height) {
        for x in clip.x..(clip.x + clip.width) {
            if point_segment_distance_sq(Point(x, y), start, end) <= radius_sq {
                set_pixel_rgba(pixels, width, height, x, y, color);
            }
        }
    }
}

fn point_segment_distance_sq(point: Point, start: Point, end: Point) -> f32 {
    let px = point.0 as f32;
    let py = point.1 as f32;
    let x0 = start.0 as f32;
    let y0 = start.1 as f32;
    let vx = end.0 as f32 - x0;
    let vy = end.1 as f32 - y0;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        let dx = px - x0;
        let dy = py - y0;
        return dx * dx + dy * dy;
    }
    let t = (((px - x0) * vx + (py - y0) * vy) / len_sq).clamp(0.0, 1.0);
    let dx = px - (x0 + vx * t);
    let dy = py - (y0 + vy * t);
    dx * dx + dy * dy
}

fn draw_brush(
    center: Point,
    color: Color,
    stroke_width: u32,
    brush: BrushShape,
    pixels: &mut [u8],
    width: u32,
    height: u32,
) {
    let radius = (stroke_width.saturating_sub(1) / 2) as i64;
    let (cx, cy) = (center.0 as i64, center.1 as i64);
    if cx + radius < 0 || cy + radius < 0 || cx - radius >= width as i64 || cy - radius >= height as i64 {
        return;
    }
    let mask = match brush {
        BrushShape::Disc => disc_mask(stroke_width),
        BrushShape::Square => square_mask(stroke_width),
    };
    for row in &mask.rows {
        let y = center.1 + row.dy;
        for dx in row.min_dx..=row.max_dx {
            set_pixel_rgba(pixels, width, height, center.0 + dx, y, color);
        }
    }
}

#[derive(Clone)]
struct BrushMask {
    rows: Vec<BrushMaskRow>,
}

#[derive(Clone)]
struct BrushMaskRow {
    dy: i32,
    min_dx: i32,
    max_dx: i32,
}

fn brush_mask_cache() -> &'static Mutex<HashMap<u32, BrushMask>> {
    static CACHE: OnceLock<Mutex<HashMap<u32, BrushMask>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn disc_mask(stroke_width: u32) -> BrushMask {
    let cache = brush_mask_cache();
    if let Ok(guard) = cache.lock() {
        if let Some(mask) = guard.get(&stroke_width) {
            return mask.clone();
        }
    }

    let radius = (stroke_width.saturating_sub(1) / 2) as i32;
    let mut rows = Vec::with_capacity((radius * 2 + 1) as usize);
    for dy in -radius..=radius {
        let mut max_dx = radius;
        while max_dx >= 0 && max_dx * max_dx + dy * dy > radius * radius {
            max_dx -= 1;
        }
        if max_dx >= 0 {
            rows.push(BrushMaskRow {
                dy,
                min_dx: -max_dx,
                max_dx,
            });
        }
    }
    let mask = BrushMask { rows };
    if let Ok(mut guard) = cache.lock() {
        let _ = guard.insert(stroke_width, mask.clone());
    }
    mask
}

fn square_mask(stroke_width: u32) -> BrushMask {
    let radius = (stroke_width.saturating_sub(1) / 2) as i32;
    BrushMask {
        rows: (-radius..=radius)
            .map(|dy| BrushMaskRow {
                dy,
                min_dx: -radius,
                max_dx: radius,
            })
            .collect(),
    }
}

fn set_pixel_rgba(pixels: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }

    let idx = ((y as u32 * width + x as u32) * 4) as usize;
    if idx + 3 >= pixels.len() {
        return;
    }

    // Opaque ink replaces; translucent ink is composited source-over once
    // per pixel write.
    let out = if color.a == 255 {
        color
    } else {
        blend_pixel(
            Color::rgba(pixels[idx], pixels[idx + 1], pixels[idx + 2], pixels[idx + 3]),
            color,
        )
    };
    pixels[idx] = out.r;
    pixels[idx + 1] = out.g;
    pixels[idx + 2] = out.b;
    pixels[idx + 3] = out.a;
}

fn blend_pixel(bottom: Color, top: Color) -> Color {
    let sa = top.a as f32 / 255.0;
    let da = bottom.a as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= f32::EPSILON {
        return Color::TRANSPARENT;
    }

    let blend = |s: u8, d: u8| -> u8 {
        (((s as f32 * sa) + (d as f32 * da * (1.0 - sa))) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };

    Color::rgba(
        blend(top.r, bottom.r),
        blend(top.g, bottom.g),
        blend(top.b, bottom.b),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}
