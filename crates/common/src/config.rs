//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration. Real-time push is disabled when absent.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Status-check scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Channel prefix for all published events.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Settings for the periodic subscription status check.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Seconds between two batch status checks.
    #[serde(default = "default_status_check_interval_secs")]
    pub status_check_interval_secs: u64,
    /// Capacity of the status-check request queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl SchedulerSettings {
    /// Interval between two batch status checks.
    #[must_use]
    pub const fn status_check_interval(&self) -> Duration {
        Duration::from_secs(self.status_check_interval_secs)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            status_check_interval_secs: default_status_check_interval_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "subscribe".to_string()
}

const fn default_status_check_interval_secs() -> u64 {
    60
}

const fn default_queue_capacity() -> usize {
    1024
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SUBSCRIBE_ENV`)
    /// 3. Environment variables with `SUBSCRIBE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("SUBSCRIBE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SUBSCRIBE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SUBSCRIBE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
