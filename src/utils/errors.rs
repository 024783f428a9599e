//! Error handling for Seatwise
//! 
//! This module defines the main error type used throughout the service.
//! Admission outcomes that are not failures (already registered, not
//! registered, ...) live in [`crate::models::admission`] and never appear here.

use thiserror::Error;

/// Main error type for Seatwise
#[derive(Error, Debug)]
pub enum SeatwiseError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    
    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    
    #[error("Configuration error: {0}")]
    Config(String),
    
    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },
    
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: i64 },
    
    #[error("User {user_id} is blocked from registering")]
    UserBlocked { user_id: i64 },
    
    #[error("No seats or waitlist slots left for event {event_id}")]
    NoAvailableSeats { event_id: i64 },
    
    #[error("Timed out after {waited_ms}ms waiting for admission lock on event {event_id}")]
    LockTimeout { event_id: i64, waited_ms: u64 },
    
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Seatwise operations
pub type Result<T> = std::result::Result<T, SeatwiseError>;

impl SeatwiseError {
    /// Check if the caller may retry the operation.
    ///
    /// A failed storage transaction is rolled back in full, so retrying it
    /// cannot double-apply anything.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SeatwiseError::Database(_) => true,
            SeatwiseError::Migration(_) => false,
            SeatwiseError::Redis(_) => true,
            SeatwiseError::Config(_) => false,
            SeatwiseError::EventNotFound { .. } => false,
            SeatwiseError::UserNotFound { .. } => false,
            SeatwiseError::UserBlocked { .. } => false,
            SeatwiseError::NoAvailableSeats { .. } => false,
            SeatwiseError::LockTimeout { .. } => true,
            SeatwiseError::InvalidInput(_) => false,
            SeatwiseError::Serialization(_) => false,
            SeatwiseError::Io(_) => true,
        }
    }

    /// Event or user id does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SeatwiseError::EventNotFound { .. } | SeatwiseError::UserNotFound { .. }
        )
    }

    /// Rejection caused by a business rule rather than an infrastructure fault
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            SeatwiseError::UserBlocked { .. } | SeatwiseError::NoAvailableSeats { .. }
        )
    }
    
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SeatwiseError::Database(_) => ErrorSeverity::Critical,
            SeatwiseError::Migration(_) => ErrorSeverity::Critical,
            SeatwiseError::Config(_) => ErrorSeverity::Critical,
            SeatwiseError::UserBlocked { .. } => ErrorSeverity::Info,
            SeatwiseError::NoAvailableSeats { .. } => ErrorSeverity::Info,
            SeatwiseError::EventNotFound { .. } => ErrorSeverity::Info,
            SeatwiseError::UserNotFound { .. } => ErrorSeverity::Info,
            SeatwiseError::InvalidInput(_) => ErrorSeverity::Info,
            SeatwiseError::LockTimeout { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = SeatwiseError::LockTimeout { event_id: 7, waited_ms: 5000 };
        assert!(err.is_recoverable());
        assert!(!err.is_business_rule());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_business_rules_are_not_retryable() {
        let blocked = SeatwiseError::UserBlocked { user_id: 1 };
        let full = SeatwiseError::NoAvailableSeats { event_id: 1 };
        assert!(!blocked.is_recoverable());
        assert!(!full.is_recoverable());
        assert!(blocked.is_business_rule());
        assert!(full.is_business_rule());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(SeatwiseError::EventNotFound { event_id: 3 }.is_not_found());
        assert!(SeatwiseError::UserNotFound { user_id: 3 }.is_not_found());
        assert!(!SeatwiseError::NoAvailableSeats { event_id: 3 }.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = SeatwiseError::LockTimeout { event_id: 12, waited_ms: 250 };
        assert_eq!(
            err.to_string(),
            "Timed out after 250ms waiting for admission lock on event 12"
        );
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }
}
