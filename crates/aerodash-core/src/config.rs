use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use aerodash_cache::{TtlTable, MAX_TTL_SECS};
use aerodash_services::KnownLocation;
use aerodash_sources::{
    ClientConfig, RetryConfig, DEFAULT_POLLEN_BASE_URL, DEFAULT_POOL_SIZE, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WEATHER_BASE_URL, DEFAULT_WORKER_POOL_SIZE,
};

use crate::error::ConfigError;

/// Upper bound on `upstream.max_retries`
const MAX_RETRIES: u32 = 10;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub pollen: PollenConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Locations known to the static location directory
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub weather_base_url: String,
    pub pollen_base_url: String,
    /// Per-attempt request timeout
    pub timeout_secs: u64,
    /// Idle connections kept per host
    pub pool_size: usize,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            weather_base_url: DEFAULT_WEATHER_BASE_URL.to_string(),
            pollen_base_url: DEFAULT_POLLEN_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pool_size: DEFAULT_POOL_SIZE,
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

impl UpstreamConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, self.initial_delay_ms, self.max_delay_ms)
    }

    fn client_config(&self, base_url: &str) -> ClientConfig {
        let mut config = ClientConfig::new(base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry(self.retry());
        config.pool_size = self.pool_size;
        config
    }

    pub fn weather_client(&self) -> ClientConfig {
        self.client_config(&self.weather_base_url)
    }

    pub fn pollen_client(&self) -> ClientConfig {
        self.client_config(&self.pollen_base_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Fetch workers shared by every coordinated fetch
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
}

fn default_worker_pool_size() -> usize {
    DEFAULT_WORKER_POOL_SIZE
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub weather_ttl_secs: i64,
    pub pollen_ttl_secs: i64,
    pub correlation_ttl_secs: i64,
    pub location_ttl_secs: i64,
    /// How often expired entries are swept
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttls = TtlTable::default();
        Self {
            weather_ttl_secs: ttls.weather_secs,
            pollen_ttl_secs: ttls.pollen_secs,
            correlation_ttl_secs: ttls.correlation_secs,
            location_ttl_secs: ttls.location_secs,
            cleanup_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl_table(&self) -> TtlTable {
        TtlTable {
            weather_secs: self.weather_ttl_secs,
            pollen_secs: self.pollen_ttl_secs,
            correlation_secs: self.correlation_ttl_secs,
            location_secs: self.location_ttl_secs,
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// How pollen concentrations are derived from the air-quality payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PollenDerivationKind {
    /// Per-species pollen fields
    #[default]
    Direct,
    /// Scale one proxy measurement into all five types
    Proxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollenConfig {
    pub derivation: PollenDerivationKind,
    /// Payload field used by the proxy derivation
    pub proxy_field: String,
}

impl Default for PollenConfig {
    fn default() -> Self {
        Self {
            derivation: PollenDerivationKind::Direct,
            proxy_field: "pm10".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub country: String,
    pub state: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&LocationConfig> for KnownLocation {
    fn from(location: &LocationConfig) -> Self {
        KnownLocation::new(
            location.country.clone(),
            location.state.clone(),
            location.district.clone(),
            location.latitude,
            location.longitude,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
            pollen: PollenConfig::default(),
            logging: LoggingConfig::default(),
            locations: default_locations(),
        }
    }
}

fn default_locations() -> Vec<LocationConfig> {
    vec![LocationConfig {
        country: "USA".to_string(),
        state: "NY".to_string(),
        district: "Manhattan".to_string(),
        latitude: 40.7831,
        longitude: -73.9712,
    }]
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    ///
    /// A missing file surfaces as [`ConfigError::NotFound`] and bad TOML as
    /// [`ConfigError::ParseError`], both reachable through `downcast_ref`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.display().to_string()).into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file {}", path.display()));
            }
        };

        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load()?)
    }

    /// Same as [`Config::load_validated`] for an explicit path
    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load_from(path)?)
    }

    fn validated(config: Self) -> Result<(Self, ValidationResult)> {
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(
            &self.upstream.weather_base_url,
            "upstream.weather_base_url",
            &mut result,
        );
        self.validate_url(
            &self.upstream.pollen_base_url,
            "upstream.pollen_base_url",
            &mut result,
        );

        if self.upstream.timeout_secs == 0 {
            result.add_error("upstream.timeout_secs", "Timeout must be greater than 0");
        }
        if self.upstream.pool_size == 0 {
            result.add_error("upstream.pool_size", "Connection pool size must be greater than 0");
        }
        if self.upstream.initial_delay_ms > self.upstream.max_delay_ms {
            result.add_warning(
                "upstream.initial_delay_ms",
                "Initial retry delay exceeds the maximum delay and will be capped",
            );
        }
        if self.upstream.max_retries > MAX_RETRIES {
            result.add_error(
                "upstream.max_retries",
                format!(
                    "At most {MAX_RETRIES} retries per request, got {}",
                    self.upstream.max_retries
                ),
            );
        }

        if self.fetch.worker_pool_size == 0 {
            result.add_error("fetch.worker_pool_size", "Worker pool size must be greater than 0");
        }

        let ttls = [
            ("cache.weather_ttl_secs", self.cache.weather_ttl_secs),
            ("cache.pollen_ttl_secs", self.cache.pollen_ttl_secs),
            ("cache.correlation_ttl_secs", self.cache.correlation_ttl_secs),
            ("cache.location_ttl_secs", self.cache.location_ttl_secs),
        ];
        for (field, ttl) in ttls {
            if ttl <= 0 {
                result.add_error(field, format!("TTL must be a positive number of seconds, got {ttl}"));
            } else if ttl > MAX_TTL_SECS {
                result.add_error(field, format!("TTL must be at most {MAX_TTL_SECS} seconds, got {ttl}"));
            }
        }
        if self.cache.cleanup_interval_secs == 0 {
            result.add_error(
                "cache.cleanup_interval_secs",
                "Cleanup interval must be greater than 0",
            );
        } else if self.cache.cleanup_interval_secs > MAX_TTL_SECS.unsigned_abs() {
            result.add_error(
                "cache.cleanup_interval_secs",
                format!("Cleanup interval must be at most {MAX_TTL_SECS} seconds"),
            );
        }

        if self.pollen.derivation == PollenDerivationKind::Proxy
            && self.pollen.proxy_field.trim().is_empty()
        {
            result.add_error("pollen.proxy_field", "Proxy derivation needs a payload field");
        }

        self.validate_locations(&mut result);

        result
    }

    fn validate_locations(&self, result: &mut ValidationResult) {
        if self.locations.is_empty() {
            result.add_warning("locations", "No locations configured - every lookup will fail");
        }

        let mut seen = HashSet::new();
        for (i, location) in self.locations.iter().enumerate() {
            let field = format!("locations[{i}]");

            if location.country.trim().is_empty()
                || location.state.trim().is_empty()
                || location.district.trim().is_empty()
            {
                result.add_error(&field, "country, state and district must all be set");
            }
            if !(-90.0..=90.0).contains(&location.latitude) {
                result.add_error(&field, format!("Latitude out of range: {}", location.latitude));
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                result.add_error(&field, format!("Longitude out of range: {}", location.longitude));
            }

            let name = (&location.country, &location.state, &location.district);
            if !seen.insert(name) {
                result.add_warning(
                    &field,
                    format!(
                        "Duplicate location {}/{}/{}",
                        location.country, location.state, location.district
                    ),
                );
            }
        }
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn known_locations(&self) -> Vec<KnownLocation> {
        self.locations.iter().map(KnownLocation::from).collect()
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("aerodash");

        Ok(config_dir.join("config.toml"))
    }
}
