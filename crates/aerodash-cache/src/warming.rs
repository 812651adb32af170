//! Proactive cache population.
//!
//! Record batches are filed under location-derived keys using the fixed TTL
//! for their data type. A failed `set` skips that record and warming carries on
//! with the rest of the batch. Each call appends exactly one [`WarmingRecord`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::key::{DataType, LocationKeyed, TtlTable};
use crate::store::CacheStore;

/// A value to preload under an explicit key.
///
/// Without `ttl_override` the data type's TTL from the table is used.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmingPayload<V> {
    pub value: V,
    pub ttl_override: Option<i64>,
}

impl<V> WarmingPayload<V> {
    pub fn new(value: V) -> Self {
        Self {
            value,
            ttl_override: None,
        }
    }

    pub fn with_ttl(value: V, ttl_secs: i64) -> Self {
        Self {
            value,
            ttl_override: Some(ttl_secs),
        }
    }
}

/// One entry in the append-only warming history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmingRecord {
    pub timestamp: DateTime<Utc>,
    pub data_type: DataType,
    pub requested_count: usize,
    pub warmed_count: usize,
    /// Percentage in `[0, 100]`; `0` for an empty batch.
    pub success_rate: f64,
}

/// Totals across the whole warming history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmingStats {
    pub total_operations: usize,
    pub total_requested: usize,
    pub total_warmed: usize,
    pub overall_success_rate: f64,
}

fn success_rate(warmed: usize, requested: usize) -> f64 {
    if requested == 0 {
        0.0
    } else {
        warmed as f64 / requested as f64 * 100.0
    }
}

/// Populates a shared [`CacheStore`] ahead of live requests.
#[derive(Debug)]
pub struct CacheWarmer<V> {
    cache: Arc<CacheStore<V>>,
    ttls: TtlTable,
    history: Mutex<Vec<WarmingRecord>>,
}

impl<V: Clone> CacheWarmer<V> {
    pub fn new(cache: Arc<CacheStore<V>>, ttls: TtlTable) -> Self {
        Self {
            cache,
            ttls,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn ttls(&self) -> &TtlTable {
        &self.ttls
    }

    /// Warm a batch of records of one data type. Returns how many were cached.
    pub fn warm<R>(&self, data_type: DataType, batch: Vec<R>) -> usize
    where
        R: LocationKeyed + Into<V>,
    {
        let ttl = self.ttls.ttl_for(data_type);
        let requested = batch.len();
        let mut warmed = 0;

        for record in batch {
            let key = record.cache_key(data_type);
            match self.cache.set(key, record.into(), ttl) {
                Ok(()) => warmed += 1,
                Err(e) => tracing::warn!(%data_type, "Skipping record while warming: {}", e),
            }
        }

        self.record(data_type, requested, warmed);
        warmed
    }

    /// Preload values under explicit keys, honouring per-entry TTL overrides.
    pub fn warm_entries(
        &self,
        data_type: DataType,
        entries: Vec<(String, WarmingPayload<V>)>,
    ) -> usize {
        let default_ttl = self.ttls.ttl_for(data_type);
        let requested = entries.len();
        let mut warmed = 0;

        for (key, payload) in entries {
            let ttl = payload.ttl_override.unwrap_or(default_ttl);
            match self.cache.set(key, payload.value, ttl) {
                Ok(()) => warmed += 1,
                Err(e) => tracing::warn!(%data_type, "Skipping entry while warming: {}", e),
            }
        }

        self.record(data_type, requested, warmed);
        warmed
    }

    /// Warm every data type the provider has records for.
    ///
    /// Types for which the provider returns nothing (or an empty batch) are
    /// reported as `0` and leave no history record.
    pub fn warm_all<F>(&self, mut provider: F) -> BTreeMap<DataType, usize>
    where
        V: LocationKeyed,
        F: FnMut(DataType) -> Option<Vec<V>>,
    {
        let mut results = BTreeMap::new();
        for data_type in DataType::ALL {
            let warmed = match provider(data_type) {
                Some(batch) if !batch.is_empty() => self.warm(data_type, batch),
                _ => 0,
            };
            results.insert(data_type, warmed);
        }

        tracing::info!(?results, "Cache warming pass complete");
        results
    }

    /// Most recent `limit` records (all when `None`), oldest first.
    pub fn history(&self, limit: Option<usize>) -> Vec<WarmingRecord> {
        let history = self.history.lock();
        let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
        history[skip..].to_vec()
    }

    pub fn stats(&self) -> WarmingStats {
        let history = self.history.lock();
        let total_requested: usize = history.iter().map(|r| r.requested_count).sum();
        let total_warmed: usize = history.iter().map(|r| r.warmed_count).sum();
        WarmingStats {
            total_operations: history.len(),
            total_requested,
            total_warmed,
            overall_success_rate: success_rate(total_warmed, total_requested),
        }
    }

    fn record(&self, data_type: DataType, requested_count: usize, warmed_count: usize) {
        let record = WarmingRecord {
            timestamp: Utc::now(),
            data_type,
            requested_count,
            warmed_count,
            success_rate: success_rate(warmed_count, requested_count),
        };
        tracing::info!(
            %data_type,
            requested_count,
            warmed_count,
            "Cache warming batch recorded"
        );
        self.history.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Site {
        country: Option<String>,
        state: Option<String>,
        district: Option<String>,
        value: f64,
    }

    impl Site {
        fn new(country: &str, state: &str, district: &str, value: f64) -> Self {
            Self {
                country: Some(country.into()),
                state: Some(state.into()),
                district: Some(district.into()),
                value,
            }
        }
    }

    impl LocationKeyed for Site {
        fn country(&self) -> Option<&str> {
            self.country.as_deref()
        }
        fn state(&self) -> Option<&str> {
            self.state.as_deref()
        }
        fn district(&self) -> Option<&str> {
            self.district.as_deref()
        }
    }

    fn warmer(ttls: TtlTable) -> (CacheWarmer<Site>, Arc<CacheStore<Site>>) {
        let cache = Arc::new(CacheStore::new());
        (CacheWarmer::new(cache.clone(), ttls), cache)
    }

    #[test]
    fn test_warm_uses_location_keys_and_type_ttl() {
        let (warmer, cache) = warmer(TtlTable::default());
        let warmed = warmer.warm(
            DataType::Pollen,
            vec![Site::new("USA", "NY", "Manhattan", 1.0)],
        );

        assert_eq!(warmed, 1);
        let info = cache.get_info("pollen_USA_NY_Manhattan").unwrap();
        assert_eq!(info.ttl_secs, 86_400);
    }

    #[test]
    fn test_missing_location_parts_use_unknown() {
        let (warmer, cache) = warmer(TtlTable::default());
        let site = Site {
            country: Some("India".into()),
            state: None,
            district: None,
            value: 2.0,
        };
        warmer.warm(DataType::Weather, vec![site.clone()]);
        assert_eq!(cache.get("weather_India_unknown_unknown"), Some(site));
    }

    #[test]
    fn test_failed_set_is_skipped() {
        let ttls = TtlTable {
            weather_secs: 0,
            ..TtlTable::default()
        };
        let (warmer, cache) = warmer(ttls);
        let warmed = warmer.warm(
            DataType::Weather,
            vec![Site::new("USA", "NY", "Manhattan", 1.0)],
        );
        assert_eq!(warmed, 0);
        assert!(cache.is_empty());

        let record = &warmer.history(None)[0];
        assert_eq!(record.requested_count, 1);
        assert_eq!(record.warmed_count, 0);
        assert_eq!(record.success_rate, 0.0);
    }

    #[test]
    fn test_partial_success_with_overrides() {
        let (warmer, cache) = warmer(TtlTable::default());
        let entries = vec![
            ("a".to_string(), WarmingPayload::new(Site::new("A", "B", "C", 1.0))),
            ("b".to_string(), WarmingPayload::with_ttl(Site::new("A", "B", "D", 2.0), -1)),
            ("c".to_string(), WarmingPayload::with_ttl(Site::new("A", "B", "E", 3.0), 42)),
        ];

        assert_eq!(warmer.warm_entries(DataType::Correlation, entries), 2);
        assert_eq!(cache.get_info("a").unwrap().ttl_secs, 3600);
        assert_eq!(cache.get_info("c").unwrap().ttl_secs, 42);
        assert!(cache.get("b").is_none());

        let record = &warmer.history(None)[0];
        assert!((record.success_rate - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_still_records_history() {
        let (warmer, _) = warmer(TtlTable::default());
        assert_eq!(warmer.warm::<Site>(DataType::Location, Vec::new()), 0);

        let history = warmer.history(None);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].requested_count, 0);
        assert_eq!(history[0].success_rate, 0.0);
    }

    #[test]
    fn test_warm_all_skips_empty_types() {
        let (warmer, _) = warmer(TtlTable::default());
        let results = warmer.warm_all(|data_type| match data_type {
            DataType::Weather => Some(vec![
                Site::new("USA", "NY", "Manhattan", 1.0),
                Site::new("USA", "NY", "Brooklyn", 2.0),
            ]),
            DataType::Pollen => Some(Vec::new()),
            _ => None,
        });

        assert_eq!(results[&DataType::Weather], 2);
        assert_eq!(results[&DataType::Pollen], 0);
        assert_eq!(results[&DataType::Correlation], 0);
        assert_eq!(results[&DataType::Location], 0);
        assert_eq!(warmer.history(None).len(), 1);
    }

    #[test]
    fn test_history_limit_returns_most_recent() {
        let (warmer, _) = warmer(TtlTable::default());
        warmer.warm::<Site>(DataType::Weather, Vec::new());
        warmer.warm::<Site>(DataType::Pollen, Vec::new());
        warmer.warm::<Site>(DataType::Location, Vec::new());

        let last_two = warmer.history(Some(2));
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].data_type, DataType::Pollen);
        assert_eq!(last_two[1].data_type, DataType::Location);
        assert_eq!(warmer.history(Some(10)).len(), 3);
    }

    #[test]
    fn test_stats_aggregate_history() {
        let (warmer, _) = warmer(TtlTable::default());
        warmer.warm(
            DataType::Weather,
            vec![
                Site::new("USA", "NY", "Manhattan", 1.0),
                Site::new("USA", "NY", "Queens", 1.0),
            ],
        );
        warmer.warm::<Site>(DataType::Pollen, Vec::new());

        let stats = warmer.stats();
        assert_eq!(stats.total_operations, 2);
        assert_eq!(stats.total_requested, 2);
        assert_eq!(stats.total_warmed, 2);
        assert_eq!(stats.overall_success_rate, 100.0);
    }
}
