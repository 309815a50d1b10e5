//! Logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Log lines go to stderr so command output on
/// stdout stays machine-readable.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `verbose`.
/// Calling it again is a no-op.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
