//! Subscriber initialization.
//!
//! Filtering follows `RUST_LOG` when set, otherwise the given default directive.
//! Output is JSON lines unless `ARKPOS_LOG_FORMAT=pretty`.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("ARKPOS_LOG_FORMAT").as_deref() {
            Ok("pretty") | Ok("text") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// JSON logs at `info` unless overridden. Later calls are no-ops.
pub fn init() {
    init_with(DEFAULT_DIRECTIVE, LogFormat::from_env());
}

pub fn init_with(default_directive: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    // try_init: tests and embedding binaries may have installed a subscriber already.
    let _ = match format {
        LogFormat::Json => builder
            .json()
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}
