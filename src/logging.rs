//! Logging setup.
//!
//! Installs a global tracing subscriber writing to stderr, so stdout stays free for
//! machine-readable output. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter for the crate
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize tracing once per process.
///
/// Subsequent calls are no-ops, as is a call made after another subscriber was
/// installed by the host application.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
