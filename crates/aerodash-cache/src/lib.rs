//! In-memory TTL cache and cache warming for aerodash.
//!
//! The store is explicitly constructed and shared by handle; there is no
//! process-wide instance.

pub mod clock;
pub mod entry;
pub mod error;
pub mod key;
pub mod store;
pub mod warming;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CacheStats, EntryInfo, Lookup};
pub use error::CacheError;
pub use key::{cache_key, DataType, LocationKeyed, TtlTable, MAX_TTL_SECS, UNKNOWN_PART};
pub use store::CacheStore;
pub use warming::{CacheWarmer, WarmingPayload, WarmingRecord, WarmingStats};
