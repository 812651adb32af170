//! The upstream client seam and its shared HTTP setup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::UpstreamError;
use crate::retry::{send_with_retry, RetryConfig};
use crate::types::RawPayload;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POOL_SIZE: usize = 10;
const USER_AGENT: &str = concat!("aerodash/", env!("CARGO_PKG_VERSION"));

/// One upstream data provider.
///
/// `fetch_raw` performs the network call (with retries); `normalize` turns
/// the payload into a canonical reading and never fails.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    type Reading: Send + 'static;

    fn name(&self) -> &'static str;

    async fn fetch_raw(&self, latitude: f64, longitude: f64) -> Result<RawPayload, UpstreamError>;

    fn normalize(&self, raw: &RawPayload, latitude: f64, longitude: f64) -> Self::Reading;

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Self::Reading, UpstreamError> {
        let raw = self.fetch_raw(latitude, longitude).await?;
        Ok(self.normalize(&raw, latitude, longitude))
    }
}

/// Connection settings for one upstream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Idle connections kept per host
    pub pool_size: usize,
    pub retry: RetryConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pool_size: DEFAULT_POOL_SIZE,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Build a pooled client that is reused for every request of one source.
pub(crate) fn build_http_client(config: &ClientConfig) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(config.timeout)
        .pool_max_idle_per_host(config.pool_size)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpstreamError::Client(e.to_string()))
}

/// GET `url` with query parameters, retrying transient failures, and parse the
/// body as JSON. A body that is not JSON fails without retrying.
pub(crate) async fn get_json(
    source_name: &'static str,
    client: &Client,
    config: &ClientConfig,
    url: &str,
    query: &[(&str, String)],
) -> Result<RawPayload, UpstreamError> {
    let body = send_with_retry(source_name, &config.retry, || {
        client.get(url).query(query).send()
    })
    .await?;

    serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed {
        source_name,
        message: e.to_string(),
    })
}

/// Read a numeric field from a JSON object, treating anything else as missing.
pub(crate) fn number(object: Option<&RawPayload>, field: &str) -> Option<f64> {
    object
        .and_then(|o| o.get(field))
        .and_then(serde_json::Value::as_f64)
        .filter(|v| v.is_finite())
}
