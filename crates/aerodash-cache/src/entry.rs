use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A stored value plus its expiry metadata.
///
/// `expires_at` is always `inserted_at + ttl_secs`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub ttl_secs: i64,
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// `None` when `inserted_at + ttl_secs` is not representable.
    pub fn new(value: V, inserted_at: DateTime<Utc>, ttl_secs: i64) -> Option<Self> {
        let expires_at = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| inserted_at.checked_add_signed(ttl))?;
        Some(Self {
            value,
            inserted_at,
            ttl_secs,
            expires_at,
        })
    }

    /// An entry is expired strictly after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn info(&self, now: DateTime<Utc>) -> EntryInfo {
        EntryInfo {
            inserted_at: self.inserted_at,
            ttl_secs: self.ttl_secs,
            expires_at: self.expires_at,
            is_expired: self.is_expired_at(now),
            remaining_secs: (self.expires_at - now).num_seconds().max(0),
        }
    }
}

/// Metadata view of an entry, as returned by `get_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub inserted_at: DateTime<Utc>,
    pub ttl_secs: i64,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub remaining_secs: i64,
}

/// Snapshot of cache occupancy and hit/miss counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub valid_entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage in `[0, 100]`.
    pub hit_rate: f64,
    /// Percentage in `[0, 100]`.
    pub miss_rate: f64,
}

/// Outcome of a single lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Miss,
    /// The entry existed but was past its expiry; it has been removed.
    Expired,
}

impl<V> Lookup<V> {
    pub fn into_option(self) -> Option<V> {
        match self {
            Self::Hit(v) => Some(v),
            Self::Miss | Self::Expired => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}
