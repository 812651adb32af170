//! Retry utilities for upstream HTTP requests with exponential backoff.
//!
//! Retried:
//! - Timeouts and connection failures
//! - 429, 500, 502, 503 and 504 responses
//! - Success responses whose body cannot be read in full
//!
//! Everything else fails on the first attempt.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::error::UpstreamError;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 8000;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first request
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Calculate the delay before retry number `attempt + 1`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Exponential backoff: initial_delay * 2^attempt
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Check if a reqwest error is retryable
pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() {
        tracing::debug!("Request timed out, will retry");
        return RetryDecision::Retry;
    }

    if error.is_connect() {
        tracing::debug!("Connection error, will retry");
        return RetryDecision::Retry;
    }

    if let Some(status) = error.status() {
        return is_retryable_status(status);
    }

    RetryDecision::NoRetry
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            tracing::debug!("Transient status ({}), will retry", status);
            RetryDecision::Retry
        }
        _ => RetryDecision::NoRetry,
    }
}

/// Send a request with retry logic, returning the body of the first
/// successful response.
///
/// The body is read inside the attempt, so a response that stalls or breaks
/// off after its headers is retried like a failed request. Non-success
/// statuses that are not retryable fail immediately with
/// [`UpstreamError::Status`]. Once retries are exhausted the last cause is
/// reported in [`UpstreamError::RetriesExhausted`].
pub async fn send_with_retry<F, Fut>(
    source_name: &'static str,
    config: &RetryConfig,
    operation: F,
) -> Result<String, UpstreamError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let attempts = config.max_retries.saturating_add(1);
    let mut last_cause = String::from("no attempt made");

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            tracing::info!(
                source = source_name,
                "Retry attempt {} of {}, waiting {:?}",
                attempt,
                config.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.text().await {
                        Ok(body) => {
                            if attempt > 0 {
                                tracing::info!(source = source_name, "Request succeeded after {} retries", attempt);
                            }
                            return Ok(body);
                        }
                        Err(e) => {
                            tracing::warn!(
                                source = source_name,
                                "Failed to read response body on attempt {} of {}: {}",
                                attempt + 1,
                                attempts,
                                e
                            );
                            last_cause = e.to_string();
                            continue;
                        }
                    }
                }

                if is_retryable_status(status) == RetryDecision::NoRetry {
                    tracing::debug!(source = source_name, "Non-retryable status {}", status);
                    return Err(UpstreamError::Status {
                        source_name,
                        status: status.as_u16(),
                    });
                }

                tracing::warn!(
                    source = source_name,
                    "Request returned retryable status {}, attempt {} of {}",
                    status,
                    attempt + 1,
                    attempts
                );
                last_cause = format!("HTTP {}", status.as_u16());
            }
            Err(e) => {
                if is_retryable_error(&e) == RetryDecision::NoRetry {
                    tracing::debug!(source = source_name, "Non-retryable error: {}", e);
                    return Err(UpstreamError::Request {
                        source_name,
                        message: e.to_string(),
                    });
                }

                tracing::warn!(
                    source = source_name,
                    "Retryable error on attempt {} of {}: {}",
                    attempt + 1,
                    attempts,
                    e
                );
                last_cause = e.to_string();
            }
        }
    }

    tracing::error!(source = source_name, "All {} attempts exhausted", attempts);
    Err(UpstreamError::RetriesExhausted {
        source_name,
        attempts,
        last_cause,
    })
}
