//! Logging configuration and setup
//! 
//! This module provides logging initialization and structured logging utilities
//! for the admission service.

use tracing::{info, warn, debug, error};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use crate::config::LoggingConfig;
use crate::utils::errors::{SeatwiseError, Result};

/// Initialize logging based on configuration
///
/// When a log directory is configured the returned guard must be kept alive,
/// otherwise buffered file output is dropped.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.level)
        .map_err(|e| SeatwiseError::Config(format!("Invalid log filter: {}", e)))?;

    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stdout).boxed()
    };

    let (file_layer, guard) = match &config.file_path {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "seatwise.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SeatwiseError::Config(format!("Logging already initialized: {}", e)))?;
        
    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log the outcome of an admission-affecting operation
pub fn log_admission(event_id: i64, user_id: i64, operation: &str, outcome: &str) {
    info!(
        event_id = event_id,
        user_id = user_id,
        operation = operation,
        outcome = outcome,
        "Admission operation completed"
    );
}

/// Log an admission attempt rejected by a business rule or infrastructure failure
pub fn log_admission_failure(event_id: i64, user_id: i64, operation: &str, error: &SeatwiseError) {
    if error.is_business_rule() || error.is_not_found() {
        info!(
            event_id = event_id,
            user_id = user_id,
            operation = operation,
            error = %error,
            "Admission operation rejected"
        );
    } else {
        warn!(
            event_id = event_id,
            user_id = user_id,
            operation = operation,
            error = %error,
            severity = %error.severity(),
            "Admission operation failed"
        );
    }
}

/// Log waitlist promotion
pub fn log_promotion(event_id: i64, user_id: i64, seat_number: i32, renumbered: usize) {
    info!(
        event_id = event_id,
        user_id = user_id,
        seat_number = seat_number,
        renumbered = renumbered,
        "Waitlist entry promoted to seat"
    );
}

/// Log lock gate activity
pub fn log_lock_event(key: &str, action: &str, waited_ms: u64) {
    debug!(
        key = key,
        action = action,
        waited_ms = waited_ms,
        "Admission lock activity"
    );
}

/// Log database operations
pub fn log_database_operation(operation: &str, table: &str, duration_ms: u64, success: bool) {
    if success {
        debug!(
            operation = operation,
            table = table,
            duration_ms = duration_ms,
            "Database operation completed"
        );
    } else {
        error!(
            operation = operation,
            table = table,
            duration_ms = duration_ms,
            "Database operation failed"
        );
    }
}
