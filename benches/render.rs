use champdup_client::draw::render::render;
use champdup_client::draw::{Color, DrawingSurface, Point, RgbaCanvas, StrokeStyle};
use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

fn surface(strokes: usize, width: u32) -> DrawingSurface {
    let mut surface = DrawingSurface::default();
    let style = StrokeStyle {
        line_width: width,
        ..StrokeStyle::default()
    };
    for i in 0..strokes as i32 {
        surface.begin(Point(i % 375, 0), 375, style);
        for step in 1..40 {
            surface.extend(Point((i * 7 + step * 9) % 375, (step * 9 + i) % 375));
        }
        surface.commit(Utc::now());
    }
    surface
}

fn bench_render(c: &mut Criterion) {
    let thin = surface(200, 4);
    let wide = surface(200, 24);
    let mut canvas = RgbaCanvas::new(375, 375, Color::rgba(255, 255, 255, 255));

    c.bench_function("render_200_thin_strokes", |b| {
        b.iter(|| render(&thin, &mut canvas))
    });
    c.bench_function("render_200_wide_strokes", |b| {
        b.iter(|| render(&wide, &mut canvas))
    });
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
