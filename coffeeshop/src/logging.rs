//! Log output

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when `RUST_LOG` is not set
pub const DEFAULT_DIRECTIVES: &str = "info,coffeeshop=debug";

/// Installs the global `tracing` subscriber
///
/// Filtering follows `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVES`].
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
