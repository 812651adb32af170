//! Top-level error types for aerodash.
//!
//! Library crates keep their own error enums; this module gathers them into
//! one [`AppError`] with user-facing messages for presentation layers.

use aerodash_cache::CacheError;
use aerodash_services::DataServiceError;
use aerodash_sources::{CombinedFetchError, UpstreamError};
use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] CombinedFetchError),

    #[error("Data service error: {0}")]
    Data(#[from] DataServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Cache(e) => e.user_message(),
            AppError::Upstream(e) => e.user_message(),
            AppError::Fetch(_) => "All data providers are unavailable. Please try again later.",
            AppError::Data(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}
