//! Runs the weather and pollen sources concurrently and merges the outcomes.
//!
//! Each source runs to completion on its own task; a failure on one side never
//! affects the other. Both tasks draw from one bounded worker pool shared by
//! every call made through clones of the same coordinator.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{CombinedFetchError, UpstreamError};
use crate::provider::UpstreamSource;
use crate::types::{PollenReading, WeatherReading};

pub const DEFAULT_WORKER_POOL_SIZE: usize = 2;

pub type WeatherSource = Arc<dyn UpstreamSource<Reading = WeatherReading>>;
pub type PollenSource = Arc<dyn UpstreamSource<Reading = PollenReading>>;

/// Per-source errors of one coordinated fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchErrors {
    pub weather: Option<UpstreamError>,
    pub pollen: Option<UpstreamError>,
}

/// Outcome of a coordinated fetch in which at least one source succeeded.
#[derive(Debug, Clone)]
pub struct FetchResults {
    pub weather: Option<WeatherReading>,
    pub pollen: Option<PollenReading>,
    pub errors: FetchErrors,
}

impl FetchResults {
    pub fn is_complete(&self) -> bool {
        self.weather.is_some() && self.pollen.is_some()
    }
}

#[derive(Clone)]
pub struct FetchCoordinator {
    weather: WeatherSource,
    pollen: PollenSource,
    workers: Arc<Semaphore>,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("weather", &self.weather.name())
            .field("pollen", &self.pollen.name())
            .field("available_workers", &self.workers.available_permits())
            .finish()
    }
}

impl FetchCoordinator {
    pub fn new(weather: WeatherSource, pollen: PollenSource) -> Self {
        Self::with_pool_size(weather, pollen, DEFAULT_WORKER_POOL_SIZE)
    }

    /// A pool size of zero is raised to one so fetches can make progress.
    pub fn with_pool_size(weather: WeatherSource, pollen: PollenSource, pool_size: usize) -> Self {
        Self {
            weather,
            pollen,
            workers: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    /// Fetch from both sources concurrently.
    ///
    /// # Errors
    /// Returns [`CombinedFetchError`] only when both sources fail.
    pub async fn fetch_all(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<FetchResults, CombinedFetchError> {
        let weather = run_worker(self.weather.clone(), self.workers.clone(), latitude, longitude);
        let pollen = run_worker(self.pollen.clone(), self.workers.clone(), latitude, longitude);
        let (weather, pollen) = tokio::join!(weather, pollen);

        match (weather, pollen) {
            (Err(weather), Err(pollen)) => {
                tracing::error!(%weather, %pollen, "Both upstream sources failed");
                Err(CombinedFetchError { weather, pollen })
            }
            (weather, pollen) => {
                let mut errors = FetchErrors::default();
                let weather = weather
                    .map_err(|e| {
                        tracing::warn!("Weather fetch failed: {}", e);
                        errors.weather = Some(e);
                    })
                    .ok();
                let pollen = pollen
                    .map_err(|e| {
                        tracing::warn!("Pollen fetch failed: {}", e);
                        errors.pollen = Some(e);
                    })
                    .ok();

                Ok(FetchResults {
                    weather,
                    pollen,
                    errors,
                })
            }
        }
    }
}

async fn run_worker<R: Send + 'static>(
    source: Arc<dyn UpstreamSource<Reading = R>>,
    workers: Arc<Semaphore>,
    latitude: f64,
    longitude: f64,
) -> Result<R, UpstreamError> {
    let source_name = source.name();
    let handle = tokio::spawn(async move {
        let _permit = workers
            .acquire_owned()
            .await
            .map_err(|e| UpstreamError::Worker {
                source_name,
                message: e.to_string(),
            })?;
        source.fetch(latitude, longitude).await
    });

    match handle.await {
        Ok(result) => result,
        Err(e) => Err(UpstreamError::Worker {
            source_name,
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PollenLevel, PollenType, RawPayload, ReadingLocation};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Barrier;

    /// Fake source: optionally waits on a barrier, then succeeds or fails.
    struct Fake<R> {
        name: &'static str,
        reading: Option<R>,
        barrier: Option<Arc<Barrier>>,
    }

    #[async_trait]
    impl<R: Clone + Send + Sync + 'static> UpstreamSource for Fake<R> {
        type Reading = R;

        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_raw(&self, _: f64, _: f64) -> Result<RawPayload, UpstreamError> {
            Ok(RawPayload::Null)
        }

        fn normalize(&self, _: &RawPayload, _: f64, _: f64) -> R {
            unreachable!("fetch is overridden")
        }

        async fn fetch(&self, _: f64, _: f64) -> Result<R, UpstreamError> {
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            self.reading.clone().ok_or(UpstreamError::RetriesExhausted {
                source_name: self.name,
                attempts: 4,
                last_cause: "HTTP 503".into(),
            })
        }
    }

    fn weather_reading() -> WeatherReading {
        let mut reading = WeatherReading::empty(Utc::now(), ReadingLocation::from_coordinates(1.0, 2.0));
        reading.temperature = Some(20.0);
        reading
    }

    fn pollen_reading() -> PollenReading {
        PollenReading {
            timestamp: Utc::now(),
            pollen: PollenType::ALL
                .iter()
                .map(|t| (*t, PollenLevel::classify(*t, 1.0)))
                .collect(),
            air_quality_index: None,
            pm10: None,
            pm2_5: None,
            location: ReadingLocation::from_coordinates(1.0, 2.0),
            stale: false,
            stale_reason: None,
        }
    }

    fn coordinator(
        weather: Option<WeatherReading>,
        pollen: Option<PollenReading>,
        barrier: Option<Arc<Barrier>>,
    ) -> FetchCoordinator {
        FetchCoordinator::new(
            Arc::new(Fake {
                name: "weather",
                reading: weather,
                barrier: barrier.clone(),
            }),
            Arc::new(Fake {
                name: "pollen",
                reading: pollen,
                barrier,
            }),
        )
    }

    #[tokio::test]
    async fn test_both_succeed() {
        let results = coordinator(Some(weather_reading()), Some(pollen_reading()), None)
            .fetch_all(1.0, 2.0)
            .await
            .unwrap();
        assert!(results.is_complete());
        assert_eq!(results.errors, FetchErrors::default());
    }

    #[tokio::test]
    async fn test_weather_failure_is_isolated() {
        let results = coordinator(None, Some(pollen_reading()), None)
            .fetch_all(1.0, 2.0)
            .await
            .unwrap();
        assert!(results.weather.is_none());
        assert!(results.pollen.is_some());
        assert!(results.errors.weather.is_some());
        assert!(results.errors.pollen.is_none());
    }

    #[tokio::test]
    async fn test_pollen_failure_is_isolated() {
        let results = coordinator(Some(weather_reading()), None, None)
            .fetch_all(1.0, 2.0)
            .await
            .unwrap();
        assert_eq!(results.weather.unwrap().temperature, Some(20.0));
        assert!(results.pollen.is_none());
        assert!(matches!(
            results.errors.pollen,
            Some(UpstreamError::RetriesExhausted { source_name: "pollen", .. })
        ));
    }

    #[tokio::test]
    async fn test_both_fail_is_combined_error() {
        let err = coordinator(None, None, None).fetch_all(1.0, 2.0).await.unwrap_err();
        assert_eq!(err.weather.source_name(), Some("weather"));
        assert_eq!(err.pollen.source_name(), Some("pollen"));
    }

    #[tokio::test]
    async fn test_sources_run_concurrently() {
        // Each fake blocks until the other has started; serial execution
        // would never get past the barrier.
        let barrier = Arc::new(Barrier::new(2));
        let coordinator = coordinator(Some(weather_reading()), Some(pollen_reading()), Some(barrier));

        let results = tokio::time::timeout(Duration::from_secs(5), coordinator.fetch_all(1.0, 2.0))
            .await
            .expect("sources did not run concurrently")
            .unwrap();
        assert!(results.is_complete());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_share_pool() {
        let coordinator = coordinator(Some(weather_reading()), Some(pollen_reading()), None);
        let calls: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.fetch_all(1.0, 2.0).await })
            })
            .collect();

        for call in calls {
            assert!(call.await.unwrap().unwrap().is_complete());
        }
        assert_eq!(coordinator.workers.available_permits(), DEFAULT_WORKER_POOL_SIZE);
    }
}
