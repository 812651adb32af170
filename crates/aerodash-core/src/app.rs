use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use aerodash_cache::{CacheStore, CacheWarmer, DataType};
use aerodash_services::{spawn_cleanup_task, CachedData, DataService, StaticLocationDirectory};
use aerodash_sources::{
    DirectDerivation, FetchCoordinator, PollenClient, PollenDerivation, PollenSource,
    ProxyDerivation, WeatherClient, WeatherSource,
};

use crate::config::{Config, PollenDerivationKind};
use crate::error::{AppError, ConfigError};

/// Composition root: one cache instance shared by the data service, the
/// warmer and the cleanup task.
pub struct App {
    config: Arc<Config>,
    cache: Arc<CacheStore<CachedData>>,
    directory: Arc<StaticLocationDirectory>,
    warmer: CacheWarmer<CachedData>,
    service: DataService,
    cancel: CancellationToken,
    cleanup: Option<JoinHandle<()>>,
}

impl App {
    /// Build the application with the HTTP clients described by `config`.
    ///
    /// # Errors
    /// Fails when the config does not validate or an HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        let weather: WeatherSource = Arc::new(WeatherClient::new(config.upstream.weather_client())?);
        let derivation: Arc<dyn PollenDerivation> = match config.pollen.derivation {
            PollenDerivationKind::Direct => Arc::new(DirectDerivation),
            PollenDerivationKind::Proxy => {
                Arc::new(ProxyDerivation::new(config.pollen.proxy_field.clone()))
            }
        };
        let pollen: PollenSource = Arc::new(PollenClient::with_derivation(
            config.upstream.pollen_client(),
            derivation,
        )?);

        Ok(Self::with_sources(config, weather, pollen))
    }

    /// Build the application around caller-supplied upstream sources.
    pub fn with_sources(config: Config, weather: WeatherSource, pollen: PollenSource) -> Self {
        Self::with_cache(config, weather, pollen, Arc::new(CacheStore::new()))
    }

    pub fn with_cache(
        config: Config,
        weather: WeatherSource,
        pollen: PollenSource,
        cache: Arc<CacheStore<CachedData>>,
    ) -> Self {
        let ttls = config.cache.ttl_table();
        let directory = Arc::new(StaticLocationDirectory::new(config.known_locations()));
        let coordinator =
            FetchCoordinator::with_pool_size(weather, pollen, config.fetch.worker_pool_size);
        let service = DataService::new(directory.clone(), coordinator, cache.clone()).with_ttls(ttls);
        let warmer = CacheWarmer::new(cache.clone(), ttls);

        tracing::info!(
            locations = directory.locations().len(),
            workers = config.fetch.worker_pool_size,
            "Application assembled"
        );

        Self {
            config: Arc::new(config),
            cache,
            directory,
            warmer,
            service,
            cancel: CancellationToken::new(),
            cleanup: None,
        }
    }

    /// Start background work. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.cleanup.is_some() {
            return;
        }
        let warmed = self.warm_locations();
        tracing::info!(warmed, "Warmed location entries");

        self.cleanup = Some(spawn_cleanup_task(
            self.cache.clone(),
            self.config.cache.cleanup_interval(),
            self.cancel.clone(),
        ));
    }

    /// Preload every configured location under its `location_*` key.
    pub fn warm_locations(&self) -> usize {
        self.warmer
            .warm(DataType::Location, self.directory.locations().to_vec())
    }

    /// Stop background work and wait for it to finish.
    pub async fn shutdown(&mut self) {
        tracing::info!("Shutting down application");
        self.cancel.cancel();

        if let Some(handle) = self.cleanup.take() {
            if let Err(e) = handle.await {
                tracing::error!("Cleanup task ended abnormally: {}", e);
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn service(&self) -> &DataService {
        &self.service
    }

    pub fn warmer(&self) -> &CacheWarmer<CachedData> {
        &self.warmer
    }

    pub fn cache(&self) -> &Arc<CacheStore<CachedData>> {
        &self.cache
    }

    pub fn directory(&self) -> &StaticLocationDirectory {
        &self.directory
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
