//! Telemetry helpers for structured logging.

use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`. Users can install their own subscriber;
/// this helper installs a default env-based subscriber if none is set.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Initialize tracing from `RUST_LOG`, falling back to `directive` when the
/// variable is unset or invalid. Does nothing if a subscriber is installed.
pub fn init_tracing_with_default(directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
