//! Tracing subscriber setup for the `cirrus` binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize console logging.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug output for
/// the cirrus crates.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "info,cirrus=debug,cirrus_storage=debug,cirrus_cache=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
