//! Weather client for the Open-Meteo forecast API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::instrument;

use crate::error::UpstreamError;
use crate::provider::{build_http_client, get_json, number, ClientConfig, UpstreamSource};
use crate::types::{RawPayload, ReadingLocation, WeatherCondition, WeatherReading};

pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.open-meteo.com";
const FORECAST_PATH: &str = "/v1/forecast";
const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
pressure_msl,wind_speed_10m,wind_direction_10m,precipitation,uv_index,cloud_cover,weather_code";

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    config: ClientConfig,
}

impl WeatherClient {
    /// # Errors
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, UpstreamError> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl UpstreamSource for WeatherClient {
    type Reading = WeatherReading;

    fn name(&self) -> &'static str {
        "weather"
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_raw(&self, latitude: f64, longitude: f64) -> Result<RawPayload, UpstreamError> {
        let url = self.config.endpoint(FORECAST_PATH);
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("timezone", "UTC".to_string()),
        ];
        get_json(self.name(), &self.client, &self.config, &url, &query).await
    }

    fn normalize(&self, raw: &RawPayload, latitude: f64, longitude: f64) -> WeatherReading {
        let current = raw.get("current");
        WeatherReading {
            timestamp: Utc::now(),
            temperature: number(current, "temperature_2m"),
            feels_like: number(current, "apparent_temperature"),
            humidity: number(current, "relative_humidity_2m"),
            pressure: number(current, "pressure_msl"),
            wind_speed: number(current, "wind_speed_10m"),
            wind_direction: number(current, "wind_direction_10m"),
            precipitation: number(current, "precipitation"),
            uv_index: number(current, "uv_index"),
            cloud_cover: number(current, "cloud_cover"),
            condition: current
                .and_then(|c| c.get("weather_code"))
                .and_then(serde_json::Value::as_i64)
                .map(WeatherCondition::from_wmo_code),
            location: ReadingLocation::from_coordinates(latitude, longitude),
            stale: false,
            stale_reason: None,
        }
    }
}
