//! Values stored in the shared cache.

use std::collections::BTreeMap;

use aerodash_cache::{DataType, LocationKeyed};
use aerodash_sources::{PollenReading, ReadingLocation, WeatherReading};
use serde::{Deserialize, Serialize};

use crate::location::KnownLocation;
use crate::validate::{validate_pollen, validate_weather};

/// Output of the correlation component, cached per location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSnapshot {
    pub country: String,
    pub state: String,
    pub district: String,
    pub coefficients: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum CachedData {
    Weather(WeatherReading),
    Pollen(PollenReading),
    Correlation(CorrelationSnapshot),
    Location(KnownLocation),
}

impl CachedData {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Weather(_) => DataType::Weather,
            Self::Pollen(_) => DataType::Pollen,
            Self::Correlation(_) => DataType::Correlation,
            Self::Location(_) => DataType::Location,
        }
    }

    fn parts(&self) -> (&str, &str, &str) {
        match self {
            Self::Weather(r) => (&r.location.country, &r.location.state, &r.location.district),
            Self::Pollen(r) => (&r.location.country, &r.location.state, &r.location.district),
            Self::Correlation(c) => (&c.country, &c.state, &c.district),
            Self::Location(l) => (&l.country, &l.state, &l.district),
        }
    }
}

impl LocationKeyed for CachedData {
    fn country(&self) -> Option<&str> {
        Some(self.parts().0)
    }
    fn state(&self) -> Option<&str> {
        Some(self.parts().1)
    }
    fn district(&self) -> Option<&str> {
        Some(self.parts().2)
    }
}

impl From<WeatherReading> for CachedData {
    fn from(reading: WeatherReading) -> Self {
        Self::Weather(reading)
    }
}

impl From<PollenReading> for CachedData {
    fn from(reading: PollenReading) -> Self {
        Self::Pollen(reading)
    }
}

impl From<CorrelationSnapshot> for CachedData {
    fn from(snapshot: CorrelationSnapshot) -> Self {
        Self::Correlation(snapshot)
    }
}

impl From<KnownLocation> for CachedData {
    fn from(location: KnownLocation) -> Self {
        Self::Location(location)
    }
}

/// A reading type the data service fetches, caches and falls back to.
pub trait CachedReading: Sized + Into<CachedData> {
    const DATA_TYPE: DataType;

    fn from_cached(data: CachedData) -> Option<Self>;
    fn with_location(self, location: ReadingLocation) -> Self;
    fn into_fresh(self) -> Self;
    fn into_stale(self, reason: String) -> Self;
    fn is_valid(&self) -> bool;
}

impl CachedReading for WeatherReading {
    const DATA_TYPE: DataType = DataType::Weather;

    fn from_cached(data: CachedData) -> Option<Self> {
        match data {
            CachedData::Weather(reading) => Some(reading),
            _ => None,
        }
    }

    fn with_location(self, location: ReadingLocation) -> Self {
        WeatherReading::with_location(self, location)
    }

    fn into_fresh(self) -> Self {
        WeatherReading::into_fresh(self)
    }

    fn into_stale(self, reason: String) -> Self {
        WeatherReading::into_stale(self, reason)
    }

    fn is_valid(&self) -> bool {
        validate_weather(self)
    }
}

impl CachedReading for PollenReading {
    const DATA_TYPE: DataType = DataType::Pollen;

    fn from_cached(data: CachedData) -> Option<Self> {
        match data {
            CachedData::Pollen(reading) => Some(reading),
            _ => None,
        }
    }

    fn with_location(self, location: ReadingLocation) -> Self {
        PollenReading::with_location(self, location)
    }

    fn into_fresh(self) -> Self {
        PollenReading::into_fresh(self)
    }

    fn into_stale(self, reason: String) -> Self {
        PollenReading::into_stale(self, reason)
    }

    fn is_valid(&self) -> bool {
        validate_pollen(self)
    }
}
