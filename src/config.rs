//! Configuration management for the weather gateway
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::WeatherError;
use crate::cache::TtlPolicy;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "TIERED_WEATHER_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherGatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Key expected in the `X-API-Key` header of admin routes
    #[serde(default = "default_admin_api_key")]
    pub admin_api_key: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
}

/// Location of the embedded database backing both tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Cache TTL policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_current_ttl")]
    pub current_ttl_minutes: u32,
    /// TTL for forecasts up to `forecast_near_days` ahead
    #[serde(default = "default_forecast_near_ttl")]
    pub forecast_near_ttl_hours: u32,
    #[serde(default = "default_forecast_far_ttl")]
    pub forecast_far_ttl_hours: u32,
    #[serde(default = "default_forecast_near_days")]
    pub forecast_near_days: u32,
    #[serde(default = "default_historical_ttl")]
    pub historical_ttl_hours: u32,
    #[serde(default = "default_stats_ttl")]
    pub stats_ttl_hours: u32,
    /// How often expired entries are swept from the cache
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_minutes: u32,
}

/// Historical store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// City keys eligible for historical persistence
    #[serde(default = "default_tracked_cities")]
    pub tracked_cities: Vec<String>,
}

/// Upstream provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,
    #[serde(default = "default_historical_url")]
    pub historical_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u32,
    /// Earliest date historical data is served for
    #[serde(default = "default_historical_floor")]
    pub historical_floor: NaiveDate,
    /// How many days ahead forecasts are served for
    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon_days: u32,
}

/// Backfill limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    #[serde(default = "default_backfill_delay")]
    pub default_delay_ms: u64,
    #[serde(default = "default_backfill_min_delay")]
    pub min_delay_ms: u64,
    #[serde(default = "default_backfill_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_days_back")]
    pub max_days_back: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_admin_api_key() -> String {
    "admin-sk".to_string()
}

fn default_request_timeout() -> u32 {
    60
}

fn default_storage_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("tiered-weather").join("db"))
        .unwrap_or_else(|| PathBuf::from("data/db"))
        .to_string_lossy()
        .into_owned()
}

fn default_current_ttl() -> u32 {
    30
}

fn default_forecast_near_ttl() -> u32 {
    3
}

fn default_forecast_far_ttl() -> u32 {
    12
}

fn default_forecast_near_days() -> u32 {
    5
}

fn default_historical_ttl() -> u32 {
    7 * 24
}

fn default_stats_ttl() -> u32 {
    24
}

fn default_sweep_interval() -> u32 {
    10
}

fn default_tracked_cities() -> Vec<String> {
    vec![
        "london,gb".to_string(),
        "paris,fr".to_string(),
        "lublin,pl".to_string(),
    ]
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_historical_url() -> String {
    "https://historical-forecast-api.open-meteo.com/v1/forecast".to_string()
}

fn default_upstream_timeout() -> u32 {
    30
}

fn default_historical_floor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1979, 1, 2).unwrap_or_default()
}

fn default_forecast_horizon() -> u32 {
    7
}

fn default_backfill_delay() -> u64 {
    1000
}

fn default_backfill_min_delay() -> u64 {
    500
}

fn default_backfill_max_delay() -> u64 {
    5000
}

fn default_max_days_back() -> u32 {
    365
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            admin_api_key: default_admin_api_key(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            current_ttl_minutes: default_current_ttl(),
            forecast_near_ttl_hours: default_forecast_near_ttl(),
            forecast_far_ttl_hours: default_forecast_far_ttl(),
            forecast_near_days: default_forecast_near_days(),
            historical_ttl_hours: default_historical_ttl(),
            stats_ttl_hours: default_stats_ttl(),
            sweep_interval_minutes: default_sweep_interval(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            tracked_cities: default_tracked_cities(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            forecast_url: default_forecast_url(),
            historical_url: default_historical_url(),
            timeout_seconds: default_upstream_timeout(),
            historical_floor: default_historical_floor(),
            forecast_horizon_days: default_forecast_horizon(),
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            default_delay_ms: default_backfill_delay(),
            min_delay_ms: default_backfill_min_delay(),
            max_delay_ms: default_backfill_max_delay(),
            max_days_back: default_max_days_back(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for WeatherGatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            upstream: UpstreamConfig::default(),
            backfill: BackfillConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CacheConfig {
    /// TTL policy derived from these settings
    #[must_use]
    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            current: Duration::from_secs(u64::from(self.current_ttl_minutes) * 60),
            forecast_near: Duration::from_secs(u64::from(self.forecast_near_ttl_hours) * 3600),
            forecast_far: Duration::from_secs(u64::from(self.forecast_far_ttl_hours) * 3600),
            forecast_near_days: i64::from(self.forecast_near_days),
            historical: Duration::from_secs(u64::from(self.historical_ttl_hours) * 3600),
            stats: Duration::from_secs(u64::from(self.stats_ttl_hours) * 3600),
        }
    }
}

impl UpstreamConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl WeatherGatewayConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
            });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides, e.g. TIERED_WEATHER__SERVER__PORT
        builder = builder.add_source(
            Environment::with_prefix("TIERED_WEATHER")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: WeatherGatewayConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tiered-weather").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.server.bind_address.is_empty() {
            self.server.bind_address = default_bind_address();
        }
        if self.server.request_timeout_seconds == 0 {
            self.server.request_timeout_seconds = default_request_timeout();
        }
        if self.storage.path.is_empty() {
            self.storage.path = default_storage_path();
        }
        if self.cache.sweep_interval_minutes == 0 {
            self.cache.sweep_interval_minutes = default_sweep_interval();
        }
        if self.upstream.forecast_url.is_empty() {
            self.upstream.forecast_url = default_forecast_url();
        }
        if self.upstream.historical_url.is_empty() {
            self.upstream.historical_url = default_historical_url();
        }
        if self.upstream.timeout_seconds == 0 {
            self.upstream.timeout_seconds = default_upstream_timeout();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        for city in &mut self.history.tracked_cities {
            *city = city.trim().to_lowercase();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_cache_policy()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate the TTL policy against the allowed window of each data kind
    fn validate_cache_policy(&self) -> Result<()> {
        let cache = &self.cache;

        if !(15..=30).contains(&cache.current_ttl_minutes) {
            return Err(
                WeatherError::config("Current weather TTL must be between 15 and 30 minutes")
                    .into(),
            );
        }

        for ttl in [cache.forecast_near_ttl_hours, cache.forecast_far_ttl_hours] {
            if !(2..=12).contains(&ttl) {
                return Err(
                    WeatherError::config("Forecast TTLs must be between 2 and 12 hours").into(),
                );
            }
        }

        if cache.forecast_near_ttl_hours > cache.forecast_far_ttl_hours {
            return Err(WeatherError::config(
                "Near-term forecast TTL cannot exceed the far-out forecast TTL",
            )
            .into());
        }

        if !(3..=5).contains(&cache.forecast_near_days) {
            return Err(
                WeatherError::config("Near-term forecast window must be 3 to 5 days").into(),
            );
        }

        if !(24..=168).contains(&cache.historical_ttl_hours) {
            return Err(WeatherError::config(
                "Historical TTL must be between 24 hours and 7 days",
            )
            .into());
        }

        if cache.stats_ttl_hours == 0 || cache.stats_ttl_hours > 168 {
            return Err(
                WeatherError::config("Stats TTL must be between 1 and 168 hours").into(),
            );
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.upstream.timeout_seconds > 300 {
            return Err(
                WeatherError::config("Upstream timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.upstream.forecast_horizon_days == 0 || self.upstream.forecast_horizon_days > 16 {
            return Err(
                WeatherError::config("Forecast horizon must be between 1 and 16 days").into(),
            );
        }

        let backfill = &self.backfill;
        if backfill.min_delay_ms > backfill.max_delay_ms
            || !(backfill.min_delay_ms..=backfill.max_delay_ms).contains(&backfill.default_delay_ms)
        {
            return Err(WeatherError::config(
                "Backfill default delay must lie within [min_delay_ms, max_delay_ms]",
            )
            .into());
        }

        if backfill.max_days_back == 0 || backfill.max_days_back > 3660 {
            return Err(
                WeatherError::config("Backfill max_days_back must be between 1 and 3660").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(WeatherError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(WeatherError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for url in [&self.upstream.forecast_url, &self.upstream.historical_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(WeatherError::config(format!(
                    "Upstream URL '{url}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        if self.server.admin_api_key.len() < 8 {
            return Err(
                WeatherError::config("Admin API key must be at least 8 characters").into(),
            );
        }

        Ok(())
    }
}
