//! Logging setup.
//!
//! Diagnostics are `tracing` events written to stderr so they never mix with
//! the report on stdout. `RUST_LOG` overrides the configured level.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Calling it twice is harmless.
///
/// `verbose` forces debug output for this crate.
pub fn init(level: &str, verbose: bool) {
    let directive = if verbose { "automover=debug" } else { level };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Initialize logging for tests (captured test output).
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
