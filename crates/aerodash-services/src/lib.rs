//! Data service for aerodash.
//!
//! Validates locations, runs coordinated upstream fetches, caches fresh
//! readings and falls back to cached data (marked stale) when a live fetch
//! fails. Also hosts the aggregation, combine and validation helpers exposed
//! to presentation layers.

pub mod aggregate;
pub mod cached;
pub mod cleanup;
pub mod combine;
pub mod error;
pub mod location;
pub mod service;
pub mod validate;

pub use aggregate::{
    aggregate, Aggregated, AggregatedBucket, AggregationRules, Aggregator, Period, SeriesRecord,
};
pub use cached::{CachedData, CachedReading, CorrelationSnapshot};
pub use cleanup::spawn_cleanup_task;
pub use combine::{combine, CombinedRecord};
pub use error::DataServiceError;
pub use location::{KnownLocation, LocationDirectory, StaticLocationDirectory};
pub use service::DataService;
pub use validate::{validate_pollen, validate_weather};
