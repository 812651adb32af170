//! Pollen client for the Open-Meteo air-quality API.
//!
//! How the five pollen concentrations are obtained from the payload is a
//! pluggable [`PollenDerivation`]; the reading shape is fixed.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::instrument;

use crate::error::UpstreamError;
use crate::provider::{build_http_client, get_json, number, ClientConfig, UpstreamSource};
use crate::types::{PollenLevel, PollenReading, PollenType, RawPayload, ReadingLocation};

pub const DEFAULT_POLLEN_BASE_URL: &str = "https://air-quality-api.open-meteo.com";
const AIR_QUALITY_PATH: &str = "/v1/air-quality";
const CURRENT_FIELDS: &str = "pm10,pm2_5,european_aqi,alder_pollen,birch_pollen,\
grass_pollen,mugwort_pollen,olive_pollen,ragweed_pollen";

/// Strategy turning the `current` block of a payload into concentrations.
///
/// Types left out of the returned map are reported as zero.
pub trait PollenDerivation: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn derive(&self, current: Option<&RawPayload>) -> BTreeMap<PollenType, f64>;
}

/// Reads per-species pollen fields. Tree pollen is the highest of alder,
/// birch and olive. The provider has no mold data, so mold stays at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDerivation;

impl PollenDerivation for DirectDerivation {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn derive(&self, current: Option<&RawPayload>) -> BTreeMap<PollenType, f64> {
        let mut out = BTreeMap::new();

        let tree = ["alder_pollen", "birch_pollen", "olive_pollen"]
            .iter()
            .filter_map(|field| number(current, field))
            .reduce(f64::max);
        if let Some(tree) = tree {
            out.insert(PollenType::Tree, tree);
        }

        for (pollen_type, field) in [
            (PollenType::Grass, "grass_pollen"),
            (PollenType::Weed, "mugwort_pollen"),
            (PollenType::Ragweed, "ragweed_pollen"),
        ] {
            if let Some(value) = number(current, field) {
                out.insert(pollen_type, value);
            }
        }
        out
    }
}

/// Scales a single proxy measurement into all five types.
///
/// Stand-in for locations where the provider has no pollen coverage.
#[derive(Debug, Clone)]
pub struct ProxyDerivation {
    pub field: String,
    pub factors: BTreeMap<PollenType, f64>,
}

impl ProxyDerivation {
    pub fn new(field: impl Into<String>) -> Self {
        let factors = BTreeMap::from([
            (PollenType::Tree, 1.5),
            (PollenType::Grass, 0.8),
            (PollenType::Weed, 0.6),
            (PollenType::Ragweed, 0.4),
            (PollenType::Mold, 40.0),
        ]);
        Self {
            field: field.into(),
            factors,
        }
    }
}

impl Default for ProxyDerivation {
    fn default() -> Self {
        Self::new("pm10")
    }
}

impl PollenDerivation for ProxyDerivation {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn derive(&self, current: Option<&RawPayload>) -> BTreeMap<PollenType, f64> {
        match number(current, &self.field) {
            Some(proxy) => self
                .factors
                .iter()
                .map(|(pollen_type, factor)| (*pollen_type, proxy * factor))
                .collect(),
            None => BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollenClient {
    client: Client,
    config: ClientConfig,
    derivation: Arc<dyn PollenDerivation>,
}

impl PollenClient {
    /// # Errors
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, UpstreamError> {
        Self::with_derivation(config, Arc::new(DirectDerivation))
    }

    /// # Errors
    /// Fails only if the HTTP client cannot be built.
    pub fn with_derivation(
        config: ClientConfig,
        derivation: Arc<dyn PollenDerivation>,
    ) -> Result<Self, UpstreamError> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            config,
            derivation,
        })
    }

    pub fn derivation_name(&self) -> &'static str {
        self.derivation.name()
    }
}

#[async_trait]
impl UpstreamSource for PollenClient {
    type Reading = PollenReading;

    fn name(&self) -> &'static str {
        "pollen"
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_raw(&self, latitude: f64, longitude: f64) -> Result<RawPayload, UpstreamError> {
        let url = self.config.endpoint(AIR_QUALITY_PATH);
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("timezone", "UTC".to_string()),
        ];
        get_json(self.name(), &self.client, &self.config, &url, &query).await
    }

    fn normalize(&self, raw: &RawPayload, latitude: f64, longitude: f64) -> PollenReading {
        let current = raw.get("current");
        let derived = self.derivation.derive(current);

        let pollen = PollenType::ALL
            .iter()
            .map(|pollen_type| {
                let concentration = derived.get(pollen_type).copied().unwrap_or(0.0).max(0.0);
                (*pollen_type, PollenLevel::classify(*pollen_type, concentration))
            })
            .collect();

        PollenReading {
            timestamp: Utc::now(),
            pollen,
            air_quality_index: number(current, "european_aqi"),
            pm10: number(current, "pm10"),
            pm2_5: number(current, "pm2_5"),
            location: ReadingLocation::from_coordinates(latitude, longitude),
            stale: false,
            stale_reason: None,
        }
    }
}
