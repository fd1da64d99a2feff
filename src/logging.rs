//! # Log output setup.
//!
//! The library itself only emits `tracing` events; binaries decide where they go.
//! [`init`] is the default choice used by the demo.

use tracing_subscriber::EnvFilter;

/// Installs a formatted stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `debug` or `info`. Leaves an already
/// installed global subscriber in place.
pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("global tracing subscriber already installed");
    }
}
