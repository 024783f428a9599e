//! Configuration validation module
//! 
//! This module provides validation functions for service configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{SeatwiseError, Result};
use super::{LockBackend, Settings};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_lock_config(&settings.lock)?;
    if settings.lock.backend == LockBackend::Redis {
        validate_redis_config(&settings.redis)?;
    }
    validate_admission_config(&settings.admission)?;
    validate_logging_config(&settings.logging)?;
    
    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SeatwiseError::Config(
            "Database URL is required".to_string()
        ));
    }
    
    if config.max_connections == 0 {
        return Err(SeatwiseError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }
    
    if config.min_connections > config.max_connections {
        return Err(SeatwiseError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }
    
    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SeatwiseError::Config(
            "Redis URL is required when the lock backend is redis".to_string()
        ));
    }
    
    Ok(())
}

/// Validate admission lock configuration
fn validate_lock_config(config: &super::LockConfig) -> Result<()> {
    if config.acquire_timeout_ms == 0 {
        return Err(SeatwiseError::Config(
            "Lock acquire timeout must be greater than 0".to_string()
        ));
    }
    
    if config.lease_ms == 0 {
        return Err(SeatwiseError::Config(
            "Lock lease must be greater than 0".to_string()
        ));
    }
    
    if config.lease_ms <= config.acquire_timeout_ms {
        return Err(SeatwiseError::Config(format!(
            "Lock lease ({} ms) must outlast the acquire timeout ({} ms)",
            config.lease_ms, config.acquire_timeout_ms
        )));
    }

    if config.retry_interval_ms == 0 {
        return Err(SeatwiseError::Config(
            "Lock retry interval must be greater than 0".to_string()
        ));
    }
    
    Ok(())
}

/// Validate event capacity defaults
fn validate_admission_config(config: &super::AdmissionConfig) -> Result<()> {
    if config.default_max_seats < 1 {
        return Err(SeatwiseError::Config(
            "Default max seats must be at least 1".to_string()
        ));
    }
    
    if config.default_max_waitlist < 0 {
        return Err(SeatwiseError::Config(
            "Default max waitlist cannot be negative".to_string()
        ));
    }
    
    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(SeatwiseError::Config(
            "Log level is required".to_string()
        ));
    }
    
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(SeatwiseError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }
    
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_zero_lock_timeout_rejected() {
        let mut settings = Settings::default();
        settings.lock.acquire_timeout_ms = 0;
        assert_matches!(validate_settings(&settings), Err(SeatwiseError::Config(_)));
    }

    #[test]
    fn test_lease_must_outlast_acquire_timeout() {
        let mut settings = Settings::default();
        settings.lock.lease_ms = settings.lock.acquire_timeout_ms;
        assert_matches!(validate_settings(&settings), Err(SeatwiseError::Config(msg)) if msg.contains("outlast"));
    }

    #[test]
    fn test_redis_url_only_required_for_redis_backend() {
        let mut settings = Settings::default();
        settings.redis.url.clear();
        assert!(validate_settings(&settings).is_err());

        settings.lock.backend = LockBackend::Local;
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_capacity_defaults_checked() {
        let mut settings = Settings::default();
        settings.admission.default_max_seats = 0;
        assert!(validate_settings(&settings).is_err());

        settings.admission.default_max_seats = 1;
        settings.admission.default_max_waitlist = -1;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert_matches!(validate_settings(&settings), Err(SeatwiseError::Config(msg)) if msg.contains("verbose"));
    }

    #[test]
    fn test_connection_bounds() {
        let mut settings = Settings::default();
        settings.database.min_connections = 20;
        assert!(validate_settings(&settings).is_err());
    }
}
