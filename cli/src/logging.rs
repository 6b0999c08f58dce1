//! Logging initialization: logs go only to file (or are dropped), never to
//! the console, so stdout stays clean for the REPL's replies.
//!
//! Reads `RUST_LOG` (falling back to `--log-level`) and `LOG_FILE` (path)
//! from the environment. When `LOG_FILE` is set, logs are appended to that
//! file; otherwise logs are dropped.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::log_format::TextWithSpanIds;

pub fn init(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.to_string()));

    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("[warn] could not open LOG_FILE {path}: {e}, logging disabled");
                let sink_layer = tracing_subscriber::fmt::layer()
                    .with_writer(std::io::sink)
                    .with_filter(filter);
                tracing_subscriber::registry().with(sink_layer).init();
                return;
            }
        };
        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(TextWithSpanIds::new())
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_filter(filter);
        tracing_subscriber::registry().with(file_layer).init();
        tracing::info!(path = %path, "relay logging to file");
    } else {
        let sink_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::sink)
            .with_filter(filter);
        tracing_subscriber::registry().with(sink_layer).init();
    }
}
