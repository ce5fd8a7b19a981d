use champdup_client::protocol::Envelope;
use champdup_client::{ClientSettings, Dispatcher, Transport};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;

struct NullTransport;

impl Transport for NullTransport {
    fn send(&mut self, _envelope: &Envelope) -> anyhow::Result<()> {
        Ok(())
    }
}

fn image(artist: &str) -> serde_json::Value {
    json!({"artists": [{"username": artist}], "dUri": "", "title": artist})
}

fn bench_vote_stream(c: &mut Criterion) {
    let voters: Vec<String> = (0..64).map(|i| format!("player{i}")).collect();
    let frames: Vec<String> = (0..voters.len())
        .map(|n| {
            json!({
                "type": "MATCHUP_VOTE",
                "value": {"left": &voters[..n / 2], "right": &voters[n / 2..n]},
            })
            .to_string()
        })
        .collect();
    let announce = json!({
        "type": "MATCHUP",
        "value": {"idx": 1, "matchup": {"left": image("ann"), "right": image("bob")}},
    })
    .to_string();
    let state = json!({
        "type": "STATE",
        "value": {"status": "RUNNING", "players": [], "event": {"name": "V1"}},
    })
    .to_string();

    c.bench_function("dispatch_64_vote_frames", |b| {
        b.iter(|| {
            let mut dispatcher = Dispatcher::new(ClientSettings::default(), NullTransport);
            dispatcher.dispatch_json(&state);
            dispatcher.dispatch_json(&announce);
            for frame in &frames {
                dispatcher.dispatch_json(frame);
            }
        })
    });
}

criterion_group!(benches, bench_vote_stream);
criterion_main!(benches);
