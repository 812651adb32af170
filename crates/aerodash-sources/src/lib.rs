//! Upstream data acquisition for aerodash.
//!
//! Weather comes from the Open-Meteo forecast API and pollen from the
//! Open-Meteo air-quality API. Both clients retry transient failures with
//! exponential backoff and normalize payloads into canonical readings; the
//! [`FetchCoordinator`] runs them side by side.

pub mod coordinator;
pub mod error;
pub mod pollen;
pub mod provider;
pub mod retry;
pub mod types;
pub mod weather;

pub use coordinator::{
    FetchCoordinator, FetchErrors, FetchResults, PollenSource, WeatherSource,
    DEFAULT_WORKER_POOL_SIZE,
};
pub use error::{CombinedFetchError, UpstreamError};
pub use pollen::{
    DirectDerivation, PollenClient, PollenDerivation, ProxyDerivation, DEFAULT_POLLEN_BASE_URL,
};
pub use provider::{ClientConfig, UpstreamSource, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT_SECS};
pub use retry::RetryConfig;
pub use types::*;
pub use weather::{WeatherClient, DEFAULT_WEATHER_BASE_URL};
