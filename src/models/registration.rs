//! Seat registrations and waitlist entries

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A held seat. `seat_number` is historical: numbers only grow per event and
/// are never handed out again after a cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub seat_number: i32,
    pub registered_at: DateTime<Utc>,
}

/// A place in the queue for a freed seat. `position` is a live rank, kept
/// gap-free 1..M for every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WaitlistEntry {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub position: i32,
    pub joined_at: DateTime<Utc>,
}
