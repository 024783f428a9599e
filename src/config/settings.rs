//! Service settings management
//! 
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main service configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub lock: LockConfig,
    pub admission: AdmissionConfig,
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
}

/// Which lock service backs the per-event admission gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Lease in Redis, shared by every worker process
    Redis,
    /// In-process map, only valid for a single worker
    Local,
}

/// Per-event admission lock configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    pub backend: LockBackend,
    pub acquire_timeout_ms: u64,
    pub lease_ms: u64,
    pub retry_interval_ms: u64,
}

impl LockConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Defaults applied to events created without explicit capacities
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    pub default_max_seats: i32,
    pub default_max_waitlist: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    ///
    /// Values missing from both sources fall back to [`Settings::default`].
    /// Nested keys use a double underscore, e.g. `SEATWISE_LOCK__LEASE_MS`.
    pub fn new() -> Result<Self, config::ConfigError> {
        let defaults = config::Config::try_from(&Settings::default())?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SEATWISE").prefix_separator("_").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SeatwiseError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/seatwise".to_string(),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_seconds: 30,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "seatwise:".to_string(),
            },
            lock: LockConfig {
                backend: LockBackend::Redis,
                acquire_timeout_ms: 5_000,
                lease_ms: 10_000,
                retry_interval_ms: 25,
            },
            admission: AdmissionConfig {
                default_max_seats: 20,
                default_max_waitlist: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                json: false,
            },
        }
    }
}
