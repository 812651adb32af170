//! The data service: location check, coordinated fetch, cache, stale fallback.

use std::sync::Arc;

use aerodash_cache::{cache_key, CacheStats, CacheStore, DataType, TtlTable};
use aerodash_sources::{
    FetchCoordinator, PollenReading, ReadingLocation, UpstreamError, WeatherReading,
};

use crate::aggregate::{aggregate, Aggregated, AggregationRules, SeriesRecord};
use crate::cached::{CachedData, CachedReading};
use crate::combine::{combine, CombinedRecord};
use crate::error::DataServiceError;
use crate::location::LocationDirectory;
use crate::validate;

/// Outcome of one coordinated fetch after validation and caching.
struct Slots {
    weather: Result<WeatherReading, UpstreamError>,
    pollen: Result<PollenReading, UpstreamError>,
}

/// Serves readings for named locations.
///
/// Fresh readings are cached under `{type}_{country}_{state}_{district}` with
/// the type's TTL. When a live fetch fails the cached reading is returned with
/// `stale = true`; with nothing cached the call fails with
/// [`DataServiceError::Unavailable`].
pub struct DataService {
    locations: Arc<dyn LocationDirectory>,
    coordinator: FetchCoordinator,
    cache: Arc<CacheStore<CachedData>>,
    ttls: TtlTable,
    rules: AggregationRules,
}

impl std::fmt::Debug for DataService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataService")
            .field("coordinator", &self.coordinator)
            .field("cached_entries", &self.cache.len())
            .field("ttls", &self.ttls)
            .finish()
    }
}

impl DataService {
    pub fn new(
        locations: Arc<dyn LocationDirectory>,
        coordinator: FetchCoordinator,
        cache: Arc<CacheStore<CachedData>>,
    ) -> Self {
        Self {
            locations,
            coordinator,
            cache,
            ttls: TtlTable::default(),
            rules: AggregationRules::default(),
        }
    }

    pub fn with_ttls(mut self, ttls: TtlTable) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn with_rules(mut self, rules: AggregationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore<CachedData>> {
        &self.cache
    }

    /// Current weather for a location, possibly served stale from cache.
    ///
    /// # Errors
    /// [`DataServiceError::InvalidLocation`] for unknown locations,
    /// [`DataServiceError::Unavailable`] when the fetch failed and nothing is
    /// cached, [`DataServiceError::Cache`] when a fresh reading cannot be cached.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_weather(
        &self,
        country: &str,
        state: &str,
        district: &str,
    ) -> Result<WeatherReading, DataServiceError> {
        let location = self.resolve(country, state, district)?;
        let slots = self.fetch_slots(&location).await?;
        self.fresh_or_stale(&location, slots.weather)
    }

    /// Current pollen levels for a location, possibly served stale from cache.
    ///
    /// # Errors
    /// Same as [`DataService::fetch_weather`].
    #[tracing::instrument(skip(self))]
    pub async fn fetch_pollen(
        &self,
        country: &str,
        state: &str,
        district: &str,
    ) -> Result<PollenReading, DataServiceError> {
        let location = self.resolve(country, state, district)?;
        let slots = self.fetch_slots(&location).await?;
        self.fresh_or_stale(&location, slots.pollen)
    }

    /// Weather and pollen from one coordinated fetch, combined.
    ///
    /// # Errors
    /// Fails when either side is unavailable after fallback, or with
    /// [`DataServiceError::Combination`] when the readings cannot be merged.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_combined(
        &self,
        country: &str,
        state: &str,
        district: &str,
    ) -> Result<CombinedRecord, DataServiceError> {
        let location = self.resolve(country, state, district)?;
        let slots = self.fetch_slots(&location).await?;
        let weather = self.fresh_or_stale(&location, slots.weather)?;
        let pollen = self.fresh_or_stale(&location, slots.pollen)?;
        combine(Some(&weather), Some(&pollen))
    }

    /// # Errors
    /// Returns [`DataServiceError::InvalidPeriod`] for an unknown period.
    pub fn aggregate(
        &self,
        series: Vec<SeriesRecord>,
        period: &str,
    ) -> Result<Aggregated, DataServiceError> {
        aggregate(series, period, &self.rules)
    }

    /// # Errors
    /// Returns [`DataServiceError::Combination`] for missing or empty readings.
    pub fn combine(
        &self,
        weather: Option<&WeatherReading>,
        pollen: Option<&PollenReading>,
    ) -> Result<CombinedRecord, DataServiceError> {
        combine(weather, pollen)
    }

    pub fn validate_weather(&self, reading: &WeatherReading) -> bool {
        validate::validate_weather(reading)
    }

    pub fn validate_pollen(&self, reading: &PollenReading) -> bool {
        validate::validate_pollen(reading)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached entry for a location. Returns how many were removed.
    pub fn invalidate_location(&self, country: &str, state: &str, district: &str) -> usize {
        let removed = DataType::ALL
            .iter()
            .filter(|dt| {
                self.cache
                    .invalidate(&cache_key(**dt, Some(country), Some(state), Some(district)))
            })
            .count();
        tracing::info!(country, state, district, removed, "Invalidated cached location data");
        removed
    }

    fn resolve(
        &self,
        country: &str,
        state: &str,
        district: &str,
    ) -> Result<ReadingLocation, DataServiceError> {
        if !self.locations.validate(country, state, district) {
            return Err(DataServiceError::invalid_location(country, state, district));
        }
        let (latitude, longitude) = self
            .locations
            .coordinates_of(country, state, district)
            .ok_or_else(|| DataServiceError::invalid_location(country, state, district))?;

        Ok(ReadingLocation::new(country, state, district, latitude, longitude))
    }

    /// Run the coordinator and cache every slot that came back valid.
    async fn fetch_slots(&self, location: &ReadingLocation) -> Result<Slots, DataServiceError> {
        let (weather, pollen) = match self
            .coordinator
            .fetch_all(location.latitude, location.longitude)
            .await
        {
            Ok(results) => (
                results.weather.ok_or_else(|| missing_slot(results.errors.weather, "weather")),
                results.pollen.ok_or_else(|| missing_slot(results.errors.pollen, "pollen")),
            ),
            Err(e) => (Err(e.weather), Err(e.pollen)),
        };

        Ok(Slots {
            weather: self.accept(location, weather)?,
            pollen: self.accept(location, pollen)?,
        })
    }

    /// Validate a fetched reading and cache it. Invalid readings turn into an
    /// upstream failure so they take the fallback path.
    fn accept<R: CachedReading + Clone>(
        &self,
        location: &ReadingLocation,
        fetched: Result<R, UpstreamError>,
    ) -> Result<Result<R, UpstreamError>, DataServiceError> {
        let reading = match fetched {
            Ok(reading) => reading,
            Err(e) => return Ok(Err(e)),
        };

        if !reading.is_valid() {
            tracing::warn!(data_type = %R::DATA_TYPE, "Upstream reading failed validation");
            return Ok(Err(UpstreamError::Rejected {
                source_name: R::DATA_TYPE.as_str(),
                message: "reading failed range validation".to_string(),
            }));
        }

        let reading = reading.with_location(location.clone()).into_fresh();
        let key = key_for(R::DATA_TYPE, location);
        self.cache
            .set(key.as_str(), reading.clone().into(), self.ttls.ttl_for(R::DATA_TYPE))?;
        tracing::debug!(key = %key, "Cached fresh reading");

        Ok(Ok(reading))
    }

    fn fresh_or_stale<R: CachedReading>(
        &self,
        location: &ReadingLocation,
        fetched: Result<R, UpstreamError>,
    ) -> Result<R, DataServiceError> {
        let error = match fetched {
            Ok(reading) => return Ok(reading),
            Err(e) => e,
        };

        let key = key_for(R::DATA_TYPE, location);
        match self.cache.get(&key).and_then(R::from_cached) {
            Some(cached) => {
                tracing::warn!(key = %key, error = %error, "Live fetch failed, serving cached reading");
                Ok(cached.into_stale(error.to_string()))
            }
            None => {
                tracing::error!(key = %key, error = %error, "Live fetch failed and nothing is cached");
                Err(DataServiceError::Unavailable {
                    data_type: R::DATA_TYPE,
                    key,
                    cause: error.to_string(),
                })
            }
        }
    }
}

fn key_for(data_type: DataType, location: &ReadingLocation) -> String {
    cache_key(
        data_type,
        Some(&location.country),
        Some(&location.state),
        Some(&location.district),
    )
}

/// A slot with no reading always carries its error; this covers the
/// impossible case without panicking.
fn missing_slot(error: Option<UpstreamError>, source_name: &'static str) -> UpstreamError {
    error.unwrap_or_else(|| UpstreamError::Worker {
        source_name,
        message: "no reading and no error reported".to_string(),
    })
}
