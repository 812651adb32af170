//! Data service error types.

use aerodash_cache::{CacheError, DataType};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataServiceError {
    #[error("Invalid location: {country}/{state}/{district}")]
    InvalidLocation {
        country: String,
        state: String,
        district: String,
    },

    #[error("Invalid aggregation period: {0} (expected weekly, monthly, half_yearly or yearly)")]
    InvalidPeriod(String),

    #[error("Cannot combine readings: {0}")]
    Combination(String),

    /// Live fetch failed and there was nothing cached to fall back on.
    #[error("{data_type} data unavailable for {key}: {cause}")]
    Unavailable {
        data_type: DataType,
        key: String,
        cause: String,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl DataServiceError {
    pub fn invalid_location(country: &str, state: &str, district: &str) -> Self {
        Self::InvalidLocation {
            country: country.to_string(),
            state: state.to_string(),
            district: district.to_string(),
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidLocation { .. } => "Location not found. Check and try again.",
            Self::InvalidPeriod(_) => "Unsupported time period.",
            Self::Combination(_) => "Weather and pollen data could not be combined.",
            Self::Unavailable { .. } => "Service unavailable. Please try again later.",
            Self::Cache(e) => e.user_message(),
        }
    }

    /// Whether this is the caller's mistake rather than a service fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidLocation { .. } | Self::InvalidPeriod(_) | Self::Combination(_)
        )
    }
}
