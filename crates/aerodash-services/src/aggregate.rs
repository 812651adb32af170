//! Resampling of historical series into calendar buckets.
//!
//! Buckets are keyed by the start of their period in UTC: Monday of the ISO
//! week, the first of the month, January 1st or July 1st for half years, and
//! January 1st for years. Only periods that contain records are emitted.

use std::collections::BTreeMap;
use std::str::FromStr;

use aerodash_sources::WeatherReading;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Weekly,
    Monthly,
    HalfYearly,
    Yearly,
}

impl FromStr for Period {
    type Err = DataServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "half_yearly" => Ok(Self::HalfYearly),
            "yearly" => Ok(Self::Yearly),
            other => Err(DataServiceError::InvalidPeriod(other.to_string())),
        }
    }
}

impl Period {
    /// Start of the period containing `timestamp`.
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let date = timestamp.date_naive();
        let start = match self {
            Self::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Self::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
            Self::HalfYearly => {
                let month = if date.month() <= 6 { 1 } else { 7 };
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
            Self::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        };
        Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN))
    }
}

/// How a field is reduced within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregator {
    Mean,
    Sum,
}

/// Field → aggregator table. Accumulating quantities are summed, everything
/// else averaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRules {
    pub default: Aggregator,
    pub overrides: BTreeMap<String, Aggregator>,
}

impl Default for AggregationRules {
    fn default() -> Self {
        let overrides = [
            ("temperature", Aggregator::Mean),
            ("humidity", Aggregator::Mean),
            ("pressure", Aggregator::Mean),
            ("wind_speed", Aggregator::Mean),
            ("uv_index", Aggregator::Mean),
            ("precipitation", Aggregator::Sum),
            ("rain", Aggregator::Sum),
            ("snowfall", Aggregator::Sum),
        ]
        .into_iter()
        .map(|(field, aggregator)| (field.to_string(), aggregator))
        .collect();

        Self {
            default: Aggregator::Mean,
            overrides,
        }
    }
}

impl AggregationRules {
    pub fn aggregator_for(&self, field: &str) -> Aggregator {
        if let Some(aggregator) = self.overrides.get(field) {
            return *aggregator;
        }
        if field.contains("precipitation") || field.ends_with("_sum") {
            return Aggregator::Sum;
        }
        self.default
    }
}

/// One record of a historical series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub values: BTreeMap<String, Option<f64>>,
}

impl SeriesRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: Option<f64>) -> Self {
        self.values.insert(field.into(), value);
        self
    }
}

impl From<&WeatherReading> for SeriesRecord {
    fn from(reading: &WeatherReading) -> Self {
        Self {
            timestamp: Some(reading.timestamp),
            values: reading
                .measurements()
                .iter()
                .map(|(field, value)| (field.to_string(), *value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    pub bucket_start: DateTime<Utc>,
    pub period: Period,
    pub record_count: usize,
    /// `None` when every value of the field in the bucket was missing.
    pub values: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    /// The series carried no timestamps and was returned as given.
    Unchanged(Vec<SeriesRecord>),
    Buckets(Vec<AggregatedBucket>),
}

impl Aggregated {
    pub fn len(&self) -> usize {
        match self {
            Self::Unchanged(records) => records.len(),
            Self::Buckets(buckets) => buckets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buckets(&self) -> &[AggregatedBucket] {
        match self {
            Self::Buckets(buckets) => buckets,
            Self::Unchanged(_) => &[],
        }
    }
}

/// Resample `series` into `period` buckets.
///
/// # Errors
/// Returns [`DataServiceError::InvalidPeriod`] for an unknown period name.
pub fn aggregate(
    series: Vec<SeriesRecord>,
    period: &str,
    rules: &AggregationRules,
) -> Result<Aggregated, DataServiceError> {
    let period: Period = period.parse()?;

    if series.is_empty() {
        return Ok(Aggregated::Buckets(Vec::new()));
    }
    if series.iter().all(|record| record.timestamp.is_none()) {
        tracing::debug!("Series has no timestamps, returning unchanged");
        return Ok(Aggregated::Unchanged(series));
    }

    let mut grouped: BTreeMap<DateTime<Utc>, Vec<&SeriesRecord>> = BTreeMap::new();
    let mut skipped = 0usize;
    for record in &series {
        match record.timestamp {
            Some(timestamp) => grouped
                .entry(period.bucket_start(timestamp))
                .or_default()
                .push(record),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "Records without timestamp left out of aggregation");
    }

    let buckets = grouped
        .into_iter()
        .map(|(bucket_start, records)| AggregatedBucket {
            bucket_start,
            period,
            record_count: records.len(),
            values: reduce_bucket(&records, rules),
        })
        .collect();

    Ok(Aggregated::Buckets(buckets))
}

fn reduce_bucket(records: &[&SeriesRecord], rules: &AggregationRules) -> BTreeMap<String, Option<f64>> {
    let mut columns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records {
        for (field, value) in &record.values {
            let column = columns.entry(field.as_str()).or_default();
            if let Some(v) = value.filter(|v| v.is_finite()) {
                column.push(v);
            }
        }
    }

    columns
        .into_iter()
        .map(|(field, values)| {
            let reduced = if values.is_empty() {
                None
            } else {
                Some(match rules.aggregator_for(field) {
                    Aggregator::Sum => values.iter().sum::<f64>(),
                    Aggregator::Mean => running_mean(&values),
                })
            };
            (field.to_string(), reduced)
        })
        .collect()
}

/// Incremental mean; a column of identical values reduces to exactly that value.
fn running_mean(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .fold(0.0, |mean, (i, v)| mean + (v - mean) / (i + 1) as f64)
}
