//! Seatwise
//!
//! Capacity-bounded admission for events: many concurrent callers compete
//! for a fixed number of seats and a fixed number of waitlist slots, and a
//! cancelled seat is handed to the head of the waitlist atomically.
//!
//! Callers use two operations, [`AdmissionEngine::register`] and
//! [`AdmissionEngine::cancel`], and render the outcome they get back.

pub mod config;
pub mod services;
pub mod models;
pub mod database;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use utils::errors::{SeatwiseError, Result};

// Re-export main components for easy access
pub use database::DatabaseService;
pub use models::{RegisterOutcome, CancelOutcome};
pub use services::{AdmissionEngine, EventGate, ServiceFactory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!("{} v{}", NAME, VERSION)
}
