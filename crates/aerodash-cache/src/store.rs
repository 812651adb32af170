//! In-memory key/value store with per-entry TTL.
//!
//! Expiry is discovered and reclaimed lazily on read, and can be reclaimed in
//! bulk with [`CacheStore::cleanup_expired`]. TTL is the only eviction policy.
//! Every operation takes the map lock for a short, bounded section; hit/miss
//! counters are atomics so `stats` never blocks writers for long.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, CacheStats, EntryInfo, Lookup};
use crate::error::CacheError;

/// Thread-safe TTL cache. Share it with `Arc<CacheStore<V>>`.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            clock,
        }
    }

    /// Look up a key, distinguishing a plain miss from an expired entry.
    ///
    /// Expired entries are removed as a side effect.
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "Cache miss");
                return Lookup::Miss;
            }
            Some(entry) if !entry.is_expired_at(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "Cache hit");
                return Lookup::Hit(entry.value.clone());
            }
            Some(_) => {}
        }

        entries.remove(key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key, "Cache entry expired, removed");
        Lookup::Expired
    }

    /// Get a live value. Expired entries behave as misses and are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).into_option()
    }

    /// Store a value for `ttl_secs` seconds, replacing any existing entry.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidTtl`] when `ttl_secs <= 0` or the expiry
    /// would overflow the timestamp range; the store is left untouched.
    pub fn set(&self, key: impl Into<String>, value: V, ttl_secs: i64) -> Result<(), CacheError> {
        let key = key.into();
        if ttl_secs <= 0 {
            return Err(CacheError::InvalidTtl { key, ttl_secs });
        }

        let Some(entry) = CacheEntry::new(value, self.clock.now(), ttl_secs) else {
            return Err(CacheError::InvalidTtl { key, ttl_secs });
        };
        tracing::debug!(key = %key, ttl_secs, "Cache set");
        self.entries.lock().insert(key, entry);
        Ok(())
    }

    /// Remove a key. Returns `true` only if an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.lock().remove(key).is_some();
        if removed {
            tracing::debug!(key, "Cache entry invalidated");
        }
        removed
    }

    /// Whether the key is past its expiry. Absent keys count as expired.
    pub fn is_expired(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .lock()
            .get(key)
            .map_or(true, |entry| entry.is_expired_at(now))
    }

    /// Remove every expired entry and return how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(removed, "Cleaned up expired cache entries");
        }
        removed
    }

    /// Drop every entry. Hit/miss counters are kept.
    pub fn clear_all(&self) {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        tracing::info!(count, "Cache cleared");
    }

    pub fn get_info(&self, key: &str) -> Option<EntryInfo> {
        let now = self.clock.now();
        self.entries.lock().get(key).map(|entry| entry.info(now))
    }

    /// Keys of entries that have not expired yet.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let (total_entries, expired_entries) = {
            let entries = self.entries.lock();
            let expired = entries
                .values()
                .filter(|entry| entry.is_expired_at(now))
                .count();
            (entries.len(), expired)
        };

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let requests = hits + misses;
        let hit_rate = if requests == 0 {
            0.0
        } else {
            hits as f64 / requests as f64 * 100.0
        };
        let miss_rate = if requests == 0 { 0.0 } else { 100.0 - hit_rate };

        CacheStats {
            total_entries,
            expired_entries,
            valid_entries: total_entries - expired_entries,
            hits,
            misses,
            hit_rate,
            miss_rate,
        }
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
