//! Cache-specific error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid TTL for key {key}: {ttl_secs}s (must be positive and within the timestamp range)")]
    InvalidTtl { key: String, ttl_secs: i64 },

    #[error("Internal cache error: {0}")]
    Internal(String),
}

impl CacheError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidTtl { .. } => "Cached data could not be stored.",
            Self::Internal(_) => "Local cache error. Data may be outdated.",
        }
    }
}
