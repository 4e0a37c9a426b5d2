//! Tracing initialization shared by `manuscript-cli` and `manuscript-api`
//! so both binary edges log the same way (`spec.md` §1 ambient logging).

use tracing_subscriber::{fmt, EnvFilter};

/// Format of the emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// One JSON object per line, for production log aggregation.
    Json,
}

/// Install the global tracing subscriber. Honors `RUST_LOG`, defaulting to
/// `info` when unset. Safe to call more than once per process; subsequent
/// calls are no-ops.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Pretty => registry.pretty().try_init(),
        LogFormat::Json => registry.json().try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
