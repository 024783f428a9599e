//! Database repositories module
//! 
//! This module contains repository implementations for the non-admission
//! side of the ledger: creating events and users, toggling flags.

pub mod user;
pub mod event;

// Re-export repositories
pub use user::UserRepository;
pub use event::EventRepository;
