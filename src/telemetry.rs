//! Logging setup.
//!
//! Console output through `tracing-subscriber`'s fmt layer. The filter comes
//! from `RUST_LOG` and defaults to `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::HueforgeError;

/// Install the global subscriber. Fails if one is already installed.
pub fn init() -> Result<(), HueforgeError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| HueforgeError::Config(format!("Failed to initialize logging: {}", e)))
}
