use champdup_client::draw::capture::{DrawingCapture, CANVAS_BACKGROUND};
use champdup_client::draw::render::render;
use champdup_client::draw::{DrawingSurface, LineCap, Point, RgbaCanvas, StrokePath, StrokeStyle};
use chrono::{DateTime, Duration, TimeZone, Utc};

const SIZE: u32 = 96;

fn at(step: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::milliseconds(step * 40)
}

/// Small deterministic generator so the stroke sequences vary without
/// pulling in a randomness crate.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: i32) -> i32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as i32
    }
}

fn replay(strokes: &[StrokePath]) -> RgbaCanvas {
    let mut surface = DrawingSurface::default();
    for stroke in strokes {
        surface.push(stroke.clone());
    }
    let mut canvas = RgbaCanvas::new(SIZE, SIZE, CANVAS_BACKGROUND);
    render(&surface, &mut canvas);
    canvas
}

fn scribble(capture: &mut DrawingCapture, rng: &mut Lcg, step: i64) {
    capture.set_brush_width(1 + rng.next(20) as u32);
    let hex = format!("#{:02x}{:02x}{:02x}", rng.next(256), rng.next(256), rng.next(256));
    capture.set_brush_color(&hex);
    capture.begin_stroke(Point(rng.next(SIZE as i32), rng.next(SIZE as i32)));
    for _ in 0..rng.next(12) {
        capture.extend_stroke(Point(rng.next(SIZE as i32), rng.next(SIZE as i32)));
    }
    capture.end_stroke(at(step)).expect("active stroke");
}

#[test]
fn committed_canvas_matches_a_fresh_replay() {
    for seed in 1..6u64 {
        let mut rng = Lcg(seed);
        let mut capture = DrawingCapture::new(SIZE, StrokeStyle::default(), 1..=50);
        for step in 0..8 {
            scribble(&mut capture, &mut rng, step);
            let expected = replay(capture.local_strokes());
            assert_eq!(
                capture.canvas().pixels(),
                expected.pixels(),
                "seed {seed} step {step}"
            );
        }
    }
}

#[test]
fn undo_matches_never_having_drawn_the_stroke() {
    let mut rng = Lcg(42);
    let mut capture = DrawingCapture::new(SIZE, StrokeStyle::default(), 1..=50);
    for step in 0..5 {
        scribble(&mut capture, &mut rng, step);
    }
    let before_last = capture.local_strokes()[..4].to_vec();

    assert!(capture.undo());
    assert_eq!(capture.local_strokes(), before_last.as_slice());
    assert_eq!(capture.canvas().pixels(), replay(&before_last).pixels());
}

#[test]
fn every_commit_undo_and_clear_renders_once() {
    let mut capture = DrawingCapture::new(SIZE, StrokeStyle::default(), 1..=50);
    capture.begin_stroke(Point(4, 4));
    capture.extend_stroke(Point(40, 40));
    capture.extend_stroke(Point(60, 20));
    assert_eq!(capture.render_count(), 0);

    capture.end_stroke(at(1));
    assert_eq!(capture.render_count(), 1);
    assert!(capture.undo());
    assert_eq!(capture.render_count(), 2);
    assert!(!capture.undo());
    assert_eq!(capture.render_count(), 2);
    capture.clear();
    assert_eq!(capture.render_count(), 3);
}

#[test]
fn empty_surface_renders_background() {
    let canvas = replay(&[]);
    assert_eq!(canvas.painted_pixels(), 0);
}

#[test]
fn square_caps_cover_the_corners_round_caps_skip() {
    let mut round = DrawingCapture::new(SIZE, StrokeStyle::default(), 1..=50);
    round.set_brush_width(9);
    round.begin_stroke(Point(48, 48));
    round.end_stroke(at(0));

    let mut square = DrawingCapture::new(
        SIZE,
        StrokeStyle {
            line_cap: LineCap::Square,
            ..StrokeStyle::default()
        },
        1..=50,
    );
    square.set_brush_width(9);
    square.begin_stroke(Point(48, 48));
    square.end_stroke(at(0));

    assert_eq!(round.canvas().pixel(44, 44), CANVAS_BACKGROUND);
    assert_ne!(square.canvas().pixel(44, 44), CANVAS_BACKGROUND);
    assert!(square.canvas().painted_pixels() > round.canvas().painted_pixels());
}
