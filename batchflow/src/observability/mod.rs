//! Tracing setup for embedding applications.

use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber.
///
/// Honors `RUST_LOG` when set, otherwise falls back to the given
/// directive (e.g. `"info"` or `"batchflow=debug"`). Calling this more
/// than once is a no-op, which keeps it safe to use from tests.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
