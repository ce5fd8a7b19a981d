use anyhow::{bail, Context};
use champdup_client::protocol::Envelope;
use champdup_client::{ClientSettings, Dispatcher, DispatchOutcome, Transport};
use std::io::{BufRead, Write};

/// Writes every outbound envelope as one JSON line.
struct StdoutTransport;

impl Transport for StdoutTransport {
    fn send(&mut self, envelope: &Envelope) -> anyhow::Result<()> {
        let line = serde_json::to_string(&serde_json::json!({ "outbound": envelope }))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").context("write outbound message")?;
        Ok(())
    }
}

fn settings_path() -> anyhow::Result<String> {
    let mut args = std::env::args().skip(1);
    let mut path = "settings.json".to_string();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => match args.next() {
                Some(value) => path = value,
                None => bail!("--settings needs a path"),
            },
            other => bail!("unexpected argument '{other}'"),
        }
    }
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    let path = settings_path()?;
    let settings = ClientSettings::load(&path)?;
    champdup_client::logging::init(settings.debug_logging);
    tracing::info!(%path, host = settings.is_host, "console client started");

    let mut dispatcher = Dispatcher::new(settings, StdoutTransport);
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        if let DispatchOutcome::Ignored(reason) = dispatcher.dispatch_json(&line) {
            tracing::debug!(?reason, "line ignored");
        }
        dispatcher.tick();

        let mut out = std::io::stdout().lock();
        for notice in dispatcher.take_notices() {
            writeln!(out, "{}", serde_json::to_string(&serde_json::json!({ "notice": notice }))?)?;
        }
        writeln!(
            out,
            "{}",
            serde_json::to_string(&serde_json::json!({ "view": dispatcher.view() }))?
        )?;
    }
    Ok(())
}
