pub mod app;
pub mod config;
pub mod error;

pub use app::App;
pub use config::{
    CacheConfig, Config, FetchConfig, LocationConfig, LoggingConfig, PollenConfig,
    PollenDerivationKind, UpstreamConfig, ValidationResult,
};
pub use error::{AppError, ConfigError};

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize logging.
///
/// `RUST_LOG` wins over `default_filter`. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        tracing::info!("aerodash core initialized");
    }
    Ok(())
}
