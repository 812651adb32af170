//! Upstream error types.

use thiserror::Error;

/// Failure of a single upstream source.
///
/// Transient faults never surface as this type directly; they are retried and
/// only reported once retries are exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{source_name}: gave up after {attempts} attempts: {last_cause}")]
    RetriesExhausted {
        source_name: &'static str,
        attempts: u32,
        last_cause: String,
    },

    #[error("{source_name}: upstream returned HTTP {status}")]
    Status { source_name: &'static str, status: u16 },

    #[error("{source_name}: request failed: {message}")]
    Request {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: malformed response: {message}")]
    Malformed {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: reading rejected: {message}")]
    Rejected {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name}: fetch worker failed: {message}")]
    Worker {
        source_name: &'static str,
        message: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl UpstreamError {
    /// Name of the source that failed, if known.
    pub fn source_name(&self) -> Option<&'static str> {
        match self {
            Self::RetriesExhausted { source_name, .. }
            | Self::Status { source_name, .. }
            | Self::Request { source_name, .. }
            | Self::Malformed { source_name, .. }
            | Self::Rejected { source_name, .. }
            | Self::Worker { source_name, .. } => Some(*source_name),
            Self::Client(_) => None,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RetriesExhausted { .. } | Self::Worker { .. } => {
                "The data provider is not responding. Please try again later."
            }
            Self::Status { status, .. } if *status >= 500 => {
                "The data provider is experiencing issues. Please try again later."
            }
            Self::Status { .. } | Self::Request { .. } => "The data request failed.",
            Self::Malformed { .. } | Self::Rejected { .. } => {
                "The data provider returned unexpected data."
            }
            Self::Client(_) => "Network setup failed. Check your settings.",
        }
    }
}

/// Both sources failed within one coordinated fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("All upstream sources failed (weather: {weather}; pollen: {pollen})")]
pub struct CombinedFetchError {
    pub weather: UpstreamError,
    pub pollen: UpstreamError,
}
