//! Event model and derived capacity figures

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::config::AdmissionConfig;
use crate::utils::errors::{SeatwiseError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub max_seats: i32,
    pub max_waitlist: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Combine the stored limits with live row counts
    pub fn capacity(&self, registered_count: i64, waitlist_count: i64) -> CapacitySummary {
        CapacitySummary {
            max_seats: self.max_seats,
            max_waitlist: self.max_waitlist,
            registered_count,
            waitlist_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub max_seats: Option<i32>,
    pub max_waitlist: Option<i32>,
}

/// Event creation input after defaults were applied and limits checked
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub max_seats: i32,
    pub max_waitlist: i32,
}

impl CreateEventRequest {
    pub fn validate(self, now: DateTime<Utc>, defaults: &AdmissionConfig) -> Result<ValidatedEvent> {
        let max_seats = self.max_seats.unwrap_or(defaults.default_max_seats);
        let max_waitlist = self.max_waitlist.unwrap_or(defaults.default_max_waitlist);

        if self.title.trim().is_empty() {
            return Err(SeatwiseError::InvalidInput("Event title is required".to_string()));
        }
        if max_seats < 1 {
            return Err(SeatwiseError::InvalidInput(format!(
                "max_seats must be at least 1, got {}",
                max_seats
            )));
        }
        if max_waitlist < 0 {
            return Err(SeatwiseError::InvalidInput(format!(
                "max_waitlist cannot be negative, got {}",
                max_waitlist
            )));
        }
        if self.starts_at <= now {
            return Err(SeatwiseError::InvalidInput(
                "Event must be scheduled in the future".to_string(),
            ));
        }

        Ok(ValidatedEvent {
            title: self.title,
            starts_at: self.starts_at,
            max_seats,
            max_waitlist,
        })
    }
}

/// Seat and waitlist occupancy of one event. Never stored, always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySummary {
    pub max_seats: i32,
    pub max_waitlist: i32,
    pub registered_count: i64,
    pub waitlist_count: i64,
}

impl CapacitySummary {
    pub fn available_seats(&self) -> i64 {
        i64::from(self.max_seats) - self.registered_count
    }

    pub fn available_waitlist(&self) -> i64 {
        i64::from(self.max_waitlist) - self.waitlist_count
    }

    pub fn has_free_seat(&self) -> bool {
        self.registered_count < i64::from(self.max_seats)
    }

    pub fn has_free_waitlist_slot(&self) -> bool {
        self.waitlist_count < i64::from(self.max_waitlist)
    }

    pub fn is_full(&self) -> bool {
        self.available_seats() <= 0 && self.available_waitlist() <= 0
    }
}
