use champdup_client::draw::capture::DrawingCapture;
use champdup_client::draw::snapshot::decode_data_uri;
use champdup_client::draw::{Color, StrokeStyle};
use champdup_client::protocol::{Envelope, Inbound, Outbound};
use chrono::{DateTime, TimeZone, Utc};

const SIZE: u32 = 80;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn device() -> DrawingCapture {
    DrawingCapture::new(SIZE, StrokeStyle::default(), 1..=50)
}

/// Sends `outbound` through JSON the way the socket would and returns what
/// the receiving side decodes.
fn over_the_wire(outbound: &Outbound) -> Inbound {
    let raw = outbound.to_json().expect("encode");
    let envelope = Envelope::from_json(&raw).expect("envelope");
    Inbound::decode(&envelope).expect("decode")
}

fn deliver(from: &Outbound, to: &mut DrawingCapture) {
    match over_the_wire(from) {
        Inbound::Path(payload) => to.apply_remote_path(payload.path),
        Inbound::Clear => to.apply_remote_clear(),
        other => panic!("unexpected inbound {other:?}"),
    }
}

fn stroke(capture: &mut DrawingCapture, points: &[(i32, i32)]) -> Outbound {
    capture.begin_stroke(points[0].into());
    for &p in &points[1..] {
        capture.extend_stroke(p.into());
    }
    capture.end_stroke(now()).expect("active stroke")
}

#[test]
fn remote_device_reproduces_the_sender_canvas() {
    let mut sender = device();
    let mut viewer = device();

    sender.set_brush_width(6);
    sender.set_brush_color("#3366ff");
    let a = stroke(&mut sender, &[(5, 5), (40, 60), (70, 10)]);
    sender.set_brush_width(16);
    let b = stroke(&mut sender, &[(10, 70), (60, 70)]);

    deliver(&a, &mut viewer);
    deliver(&b, &mut viewer);

    assert_eq!(viewer.mirror_strokes(), sender.local_strokes());
    assert!(viewer.local_strokes().is_empty());
    assert_eq!(viewer.canvas().pixels(), sender.canvas().pixels());
}

#[test]
fn path_snapshot_decodes_to_the_sender_canvas() {
    let mut sender = device();
    let out = stroke(&mut sender, &[(2, 2), (77, 77)]);
    let Outbound::Path { data_uri, .. } = &out else {
        panic!("expected PATH");
    };
    let decoded = decode_data_uri(data_uri).expect("snapshot");
    assert_eq!(decoded.width(), SIZE);
    assert_eq!(decoded.pixels(), sender.canvas().pixels());
}

#[test]
fn remote_strokes_sit_under_local_ones() {
    let mut sender = device();
    let mut viewer = device();
    viewer.set_brush_color("#ff0000");
    viewer.set_brush_width(10);
    stroke(&mut viewer, &[(0, 40), (79, 40)]);

    sender.set_brush_width(10);
    let remote = stroke(&mut sender, &[(40, 0), (40, 79)]);
    deliver(&remote, &mut viewer);

    assert_eq!(viewer.canvas().pixel(40, 40), Color::rgba(255, 0, 0, 255));
    assert_eq!(viewer.canvas().pixel(40, 5), Color::BLACK);
}

#[test]
fn clear_reaches_the_mirror_only() {
    let mut sender = device();
    let mut viewer = device();
    stroke(&mut viewer, &[(1, 1), (20, 20)]);
    let path = stroke(&mut sender, &[(30, 30), (50, 50)]);
    deliver(&path, &mut viewer);

    let clear = sender.clear();
    assert!(sender.local_strokes().is_empty());
    deliver(&clear, &mut viewer);

    assert!(viewer.mirror_strokes().is_empty());
    assert_eq!(viewer.local_strokes().len(), 1);
}

#[test]
fn shared_surface_clears_for_everyone() {
    let mut sender = device();
    let mut viewer = device();
    sender.reset_for_phase(true);
    viewer.reset_for_phase(true);

    let path = stroke(&mut sender, &[(30, 30), (50, 50)]);
    deliver(&path, &mut viewer);
    stroke(&mut viewer, &[(1, 1), (20, 20)]);

    let clear = sender.clear();
    deliver(&clear, &mut viewer);
    assert!(viewer.mirror_strokes().is_empty());
    assert!(viewer.local_strokes().is_empty());
    assert_eq!(viewer.canvas().painted_pixels(), 0);
}

#[test]
fn resync_replaces_the_mirror_wholesale() {
    let mut sender = device();
    let mut viewer = device();
    let first = stroke(&mut sender, &[(1, 1), (9, 9)]);
    deliver(&first, &mut viewer);
    stroke(&mut sender, &[(20, 20), (30, 30)]);

    viewer.resync_mirror(sender.local_strokes().to_vec());
    assert_eq!(viewer.mirror_strokes().len(), 2);
    assert_eq!(viewer.canvas().pixels(), sender.canvas().pixels());
}
