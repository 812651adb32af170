//! Cache key format and the TTL-by-data-type table.
//!
//! Keys look like `{type}_{country}_{state}_{district}`. Both the data service
//! and the warmer build keys through [`cache_key`] so that warmed entries are
//! found by live requests.

use serde::{Deserialize, Serialize};

/// Placeholder used for location parts that a record does not carry.
pub const UNKNOWN_PART: &str = "unknown";

pub const DEFAULT_WEATHER_TTL_SECS: i64 = 1800;
pub const DEFAULT_POLLEN_TTL_SECS: i64 = 86_400;
pub const DEFAULT_CORRELATION_TTL_SECS: i64 = 3600;
pub const DEFAULT_LOCATION_TTL_SECS: i64 = 604_800;
/// Longest TTL accepted from configuration (ten years).
pub const MAX_TTL_SECS: i64 = 315_360_000;

/// Kinds of data held in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Weather,
    Pollen,
    Correlation,
    Location,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Weather,
        DataType::Pollen,
        DataType::Correlation,
        DataType::Location,
    ];

    /// Key prefix for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Pollen => "pollen",
            Self::Correlation => "correlation",
            Self::Location => "location",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the cache key for a data type and location.
///
/// Missing or blank parts are replaced with [`UNKNOWN_PART`].
pub fn cache_key(
    data_type: DataType,
    country: Option<&str>,
    state: Option<&str>,
    district: Option<&str>,
) -> String {
    let part = |p: Option<&str>| match p {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => UNKNOWN_PART.to_string(),
    };
    format!(
        "{}_{}_{}_{}",
        data_type.as_str(),
        part(country),
        part(state),
        part(district)
    )
}

/// Fixed TTL for each data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlTable {
    pub weather_secs: i64,
    pub pollen_secs: i64,
    pub correlation_secs: i64,
    pub location_secs: i64,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            weather_secs: DEFAULT_WEATHER_TTL_SECS,
            pollen_secs: DEFAULT_POLLEN_TTL_SECS,
            correlation_secs: DEFAULT_CORRELATION_TTL_SECS,
            location_secs: DEFAULT_LOCATION_TTL_SECS,
        }
    }
}

impl TtlTable {
    pub fn ttl_for(&self, data_type: DataType) -> i64 {
        match data_type {
            DataType::Weather => self.weather_secs,
            DataType::Pollen => self.pollen_secs,
            DataType::Correlation => self.correlation_secs,
            DataType::Location => self.location_secs,
        }
    }
}

/// A record that can be filed under a location-derived cache key.
pub trait LocationKeyed {
    fn country(&self) -> Option<&str>;
    fn state(&self) -> Option<&str>;
    fn district(&self) -> Option<&str>;

    fn cache_key(&self, data_type: DataType) -> String {
        cache_key(data_type, self.country(), self.state(), self.district())
    }
}
