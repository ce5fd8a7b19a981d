use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. With `debug` off the level is pinned to
/// `info` and `RUST_LOG` is ignored; with it on, `RUST_LOG` may override the
/// `debug` default (e.g. `RUST_LOG=champdup_client::matchup=trace`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
