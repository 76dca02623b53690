/// Logging bootstrap for embedding applications
use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted `tracing` subscriber honoring `RUST_LOG`, defaulting
/// to info-level output for this crate. Safe to call more than once; later
/// calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("marketchat_core=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
