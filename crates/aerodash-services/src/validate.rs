//! Range and structure checks applied to readings before they are cached or
//! returned.

use std::ops::RangeInclusive;

use aerodash_sources::{PollenReading, PollenType, WeatherReading};

const TEMPERATURE_C: RangeInclusive<f64> = -90.0..=60.0;
const PERCENT: RangeInclusive<f64> = 0.0..=100.0;
const PRESSURE_HPA: RangeInclusive<f64> = 870.0..=1085.0;
const WIND_SPEED_KMH: RangeInclusive<f64> = 0.0..=500.0;
const DEGREES: RangeInclusive<f64> = 0.0..=360.0;
const UV_INDEX: RangeInclusive<f64> = 0.0..=20.0;

fn within(value: Option<f64>, range: &RangeInclusive<f64>) -> bool {
    value.map_or(true, |v| v.is_finite() && range.contains(&v))
}

/// Temperature and humidity are required; every other measurement is checked
/// only when present.
pub fn validate_weather(reading: &WeatherReading) -> bool {
    if reading.temperature.is_none() || reading.humidity.is_none() {
        return false;
    }

    within(reading.temperature, &TEMPERATURE_C)
        && within(reading.feels_like, &TEMPERATURE_C)
        && within(reading.humidity, &PERCENT)
        && within(reading.pressure, &PRESSURE_HPA)
        && within(reading.wind_speed, &WIND_SPEED_KMH)
        && within(reading.wind_direction, &DEGREES)
        && within(reading.precipitation, &(0.0..=f64::MAX))
        && within(reading.uv_index, &UV_INDEX)
        && within(reading.cloud_cover, &PERCENT)
}

/// All five pollen types must be present with a finite, non-negative
/// concentration.
pub fn validate_pollen(reading: &PollenReading) -> bool {
    PollenType::ALL.iter().all(|pollen_type| {
        reading
            .pollen
            .get(pollen_type)
            .is_some_and(|level| level.concentration.is_finite() && level.concentration >= 0.0)
    })
}
