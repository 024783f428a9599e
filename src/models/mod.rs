//! Data models module
//!
//! This module contains the capacity ledger entities and the admission
//! outcomes returned to callers

pub mod user;
pub mod event;
pub mod registration;
pub mod admission;

// Re-export commonly used models
pub use user::{User, CreateUserRequest};
pub use event::{Event, CreateEventRequest, CapacitySummary};
pub use registration::{Registration, WaitlistEntry};
pub use admission::{RegisterOutcome, CancelOutcome, Promotion, Participation, EventRoster, UserEnrollments, EnrollmentScope};
