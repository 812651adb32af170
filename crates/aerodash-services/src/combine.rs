//! Side-by-side merge of a weather and a pollen reading.

use std::collections::BTreeMap;

use aerodash_sources::{
    PollenLevel, PollenReading, PollenType, ReadingLocation, WeatherCondition, WeatherReading,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub timestamp: DateTime<Utc>,
    pub location: ReadingLocation,
    pub weather: BTreeMap<String, Option<f64>>,
    pub condition: Option<WeatherCondition>,
    pub pollen: BTreeMap<PollenType, PollenLevel>,
    pub air_quality_index: Option<f64>,
    /// Set when either side was served from cache.
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stale_reasons: Vec<String>,
}

/// Merge the two readings into one record.
///
/// When both readings carry a named location and they disagree, the weather
/// location wins and the mismatch is logged.
///
/// # Errors
/// Returns [`DataServiceError::Combination`] when either reading is missing
/// or carries no data at all.
pub fn combine(
    weather: Option<&WeatherReading>,
    pollen: Option<&PollenReading>,
) -> Result<CombinedRecord, DataServiceError> {
    let weather = weather
        .ok_or_else(|| DataServiceError::Combination("weather reading is missing".into()))?;
    let pollen =
        pollen.ok_or_else(|| DataServiceError::Combination("pollen reading is missing".into()))?;

    if weather.measurements().iter().all(|(_, value)| value.is_none()) {
        return Err(DataServiceError::Combination(
            "weather reading has no measurements".into(),
        ));
    }
    if pollen.pollen.is_empty() {
        return Err(DataServiceError::Combination(
            "pollen reading has no pollen levels".into(),
        ));
    }

    let location = if !weather.location.is_empty() {
        if !pollen.location.is_empty() && !weather.location.same_place(&pollen.location) {
            tracing::warn!(
                weather = ?weather.location,
                pollen = ?pollen.location,
                "Readings disagree on location, keeping the weather location"
            );
        }
        weather.location.clone()
    } else {
        pollen.location.clone()
    };

    let stale_reasons = [&weather.stale_reason, &pollen.stale_reason]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    Ok(CombinedRecord {
        timestamp: weather.timestamp.max(pollen.timestamp),
        location,
        weather: weather
            .measurements()
            .iter()
            .map(|(field, value)| (field.to_string(), *value))
            .collect(),
        condition: weather.condition,
        pollen: pollen.pollen.clone(),
        air_quality_index: pollen.air_quality_index,
        stale: weather.stale || pollen.stale,
        stale_reasons,
    })
}
