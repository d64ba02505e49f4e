use std::sync::OnceLock;

static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Set once from `--json`; later calls are ignored.
pub fn set_json_mode(v: bool) {
    let _ = JSON_MODE.set(v);
}

/// Whether commands print a machine-readable envelope to stdout.
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

pub fn logs_are_json() -> bool {
    matches!(std::env::var("MDCHUNK_LOG_FORMAT").as_deref(), Ok("json"))
}

/// Initialize tracing/logging according to RUST_LOG and MDCHUNK_LOG_FORMAT.
/// - Defaults to `info` (`debug` with `verbose`) if `RUST_LOG` is unset
/// - Supports `MDCHUNK_LOG_FORMAT=json` for JSON logs
/// - Always writes to stderr so stdout stays clean for `--json`
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let builder = tracing_subscriber::registry().with(filter);

    if logs_are_json() {
        let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
    } else {
        let _ = builder.with(fmt_layer.compact()).try_init();
    }
}
