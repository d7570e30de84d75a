// src/logging.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing output filtered by `RUST_LOG`, defaulting to this crate at info.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sensor_publisher=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// JSON lines instead of compact text, for log shippers.
pub fn init_json_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sensor_publisher=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .try_init();
}

/// Picks the output format from `LOG_FORMAT`: `json` for JSON lines, compact otherwise.
/// Returns whether JSON was selected.
pub fn init_from_env() -> bool {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        init_json_tracing();
    } else {
        init_tracing();
    }
    json
}
