pub mod config;
pub mod error;

pub use config::{
    Config, HandheldConfig, LoggingConfig, TransportConfig, UnitSystem, ValidationResult,
    WearConfig,
};
pub use error::{ChannelError, ForecastStoreError, SchemaError, SyncError};

use anyhow::Result;

/// Initialize tracing with the default `info` filter.
///
/// `RUST_LOG` takes precedence when set.
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize tracing, falling back to `default_filter` when `RUST_LOG` is unset.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_with_filter(default_filter: &str) -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Sunlink core initialized");
    }
    Ok(())
}
