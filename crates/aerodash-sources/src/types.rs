use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unparsed provider response body.
pub type RawPayload = serde_json::Value;

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i64) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Clear,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// Where a reading was taken.
///
/// Upstream clients only know coordinates; the data service fills in the
/// administrative names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadingLocation {
    pub country: String,
    pub state: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ReadingLocation {
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        district: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            country: country.into(),
            state: state.into(),
            district: district.into(),
            latitude,
            longitude,
        }
    }

    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// True when no administrative name is set.
    pub fn is_empty(&self) -> bool {
        self.country.is_empty() && self.state.is_empty() && self.district.is_empty()
    }

    /// Same place by name, ignoring coordinates.
    pub fn same_place(&self, other: &ReadingLocation) -> bool {
        self.country == other.country && self.state == other.state && self.district == other.district
    }
}

/// Current weather conditions, normalized from the provider payload.
///
/// Units: °C, %, hPa, km/h, degrees, mm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub uv_index: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub condition: Option<WeatherCondition>,
    pub location: ReadingLocation,
    #[serde(default)]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
}

impl WeatherReading {
    /// A reading with every measurement missing.
    pub fn empty(timestamp: DateTime<Utc>, location: ReadingLocation) -> Self {
        Self {
            timestamp,
            temperature: None,
            feels_like: None,
            humidity: None,
            pressure: None,
            wind_speed: None,
            wind_direction: None,
            precipitation: None,
            uv_index: None,
            cloud_cover: None,
            condition: None,
            location,
            stale: false,
            stale_reason: None,
        }
    }

    pub fn with_location(mut self, location: ReadingLocation) -> Self {
        self.location = location;
        self
    }

    /// Copy marked as served from cache after a failed live fetch.
    pub fn into_stale(mut self, reason: impl Into<String>) -> Self {
        self.stale = true;
        self.stale_reason = Some(reason.into());
        self
    }

    pub fn into_fresh(mut self) -> Self {
        self.stale = false;
        self.stale_reason = None;
        self
    }

    /// Numeric measurements by field name, in a fixed order.
    pub fn measurements(&self) -> [(&'static str, Option<f64>); 9] {
        [
            ("temperature", self.temperature),
            ("feels_like", self.feels_like),
            ("humidity", self.humidity),
            ("pressure", self.pressure),
            ("wind_speed", self.wind_speed),
            ("wind_direction", self.wind_direction),
            ("precipitation", self.precipitation),
            ("uv_index", self.uv_index),
            ("cloud_cover", self.cloud_cover),
        ]
    }
}

/// The five tracked pollen types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollenType {
    Tree,
    Grass,
    Weed,
    Ragweed,
    Mold,
}

impl PollenType {
    pub const ALL: [PollenType; 5] = [
        PollenType::Tree,
        PollenType::Grass,
        PollenType::Weed,
        PollenType::Ragweed,
        PollenType::Mold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Grass => "grass",
            Self::Weed => "weed",
            Self::Ragweed => "ragweed",
            Self::Mold => "mold",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::Mold => "spores/m³",
            _ => "grains/m³",
        }
    }

    /// Concentrations at which severity becomes moderate and high.
    pub fn thresholds(&self) -> (f64, f64) {
        match self {
            Self::Tree => (15.0, 90.0),
            Self::Grass => (5.0, 20.0),
            Self::Weed | Self::Ragweed => (10.0, 50.0),
            Self::Mold => (6500.0, 13_000.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

/// Concentration of one pollen type with its severity band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollenLevel {
    pub concentration: f64,
    pub severity: Severity,
    pub unit: String,
}

impl PollenLevel {
    /// Classify a concentration against the type's thresholds.
    pub fn classify(pollen_type: PollenType, concentration: f64) -> Self {
        let (moderate, high) = pollen_type.thresholds();
        let severity = if concentration >= high {
            Severity::High
        } else if concentration >= moderate {
            Severity::Moderate
        } else {
            Severity::Low
        };
        Self {
            concentration,
            severity,
            unit: pollen_type.unit().to_string(),
        }
    }
}

/// Pollen and air-quality conditions, normalized from the provider payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollenReading {
    pub timestamp: DateTime<Utc>,
    pub pollen: BTreeMap<PollenType, PollenLevel>,
    pub air_quality_index: Option<f64>,
    pub pm10: Option<f64>,
    pub pm2_5: Option<f64>,
    pub location: ReadingLocation,
    #[serde(default)]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_reason: Option<String>,
}

impl PollenReading {
    pub fn with_location(mut self, location: ReadingLocation) -> Self {
        self.location = location;
        self
    }

    pub fn into_stale(mut self, reason: impl Into<String>) -> Self {
        self.stale = true;
        self.stale_reason = Some(reason.into());
        self
    }

    pub fn into_fresh(mut self) -> Self {
        self.stale = false;
        self.stale_reason = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmo_code_mapping() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_wmo_code(48), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(57), WeatherCondition::Sleet);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_wmo_code(86), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_wmo_code(99), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn test_wmo_code_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_condition_description() {
        assert_eq!(WeatherCondition::HeavyRain.description(), "Heavy Rain");
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(PollenLevel::classify(PollenType::Grass, 4.9).severity, Severity::Low);
        assert_eq!(PollenLevel::classify(PollenType::Grass, 5.0).severity, Severity::Moderate);
        assert_eq!(PollenLevel::classify(PollenType::Grass, 25.0).severity, Severity::High);
        assert_eq!(PollenLevel::classify(PollenType::Mold, 100.0).unit, "spores/m³");
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Severity::Moderate).unwrap(), "\"MODERATE\"");
    }

    #[test]
    fn test_stale_copy_leaves_original_untouched() {
        let original = WeatherReading::empty(Utc::now(), ReadingLocation::from_coordinates(1.0, 2.0));
        let stale = original.clone().into_stale("weather: HTTP 503");
        assert!(!original.stale);
        assert!(stale.stale);
        assert_eq!(stale.stale_reason.as_deref(), Some("weather: HTTP 503"));
    }

    #[test]
    fn test_pollen_map_serializes_with_type_names() {
        let mut pollen = BTreeMap::new();
        pollen.insert(PollenType::Ragweed, PollenLevel::classify(PollenType::Ragweed, 1.0));
        let json = serde_json::to_value(&pollen).unwrap();
        assert_eq!(json["ragweed"]["severity"], "LOW");
    }

    #[test]
    fn test_location_is_empty() {
        assert!(ReadingLocation::from_coordinates(40.7, -74.0).is_empty());
        assert!(!ReadingLocation::new("USA", "NY", "Manhattan", 40.7, -74.0).is_empty());
    }
}
