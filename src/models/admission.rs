//! Admission outcomes and ledger read models
//!
//! Outcomes that are not failures are plain values. Callers match on them
//! instead of catching errors.

use serde::{Deserialize, Serialize};
use super::{CapacitySummary, Event, Registration, WaitlistEntry};

/// Result of a successful `register` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterOutcome {
    Registered { seat_number: i32 },
    Waitlisted { position: i32 },
    AlreadyRegistered { seat_number: i32 },
    AlreadyInWaitlist { position: i32 },
}

impl RegisterOutcome {
    /// Result code handed to the web layer
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterOutcome::Registered { .. } => "registered",
            RegisterOutcome::Waitlisted { .. } => "waitlisted",
            RegisterOutcome::AlreadyRegistered { .. } => "already_registered",
            RegisterOutcome::AlreadyInWaitlist { .. } => "already_in_waitlist",
        }
    }

    /// Whether the call inserted a row
    pub fn is_new(&self) -> bool {
        matches!(
            self,
            RegisterOutcome::Registered { .. } | RegisterOutcome::Waitlisted { .. }
        )
    }
}

impl std::fmt::Display for RegisterOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Waitlist entry moved into the seat a cancellation freed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub user_id: i64,
    pub seat_number: i32,
}

/// Result of a successful `cancel` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CancelOutcome {
    RegistrationCanceled { promoted: Option<Promotion> },
    WaitlistCanceled,
    NotRegistered,
}

impl CancelOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelOutcome::RegistrationCanceled { .. } => "registration_canceled",
            CancelOutcome::WaitlistCanceled => "waitlist_canceled",
            CancelOutcome::NotRegistered => "not_registered",
        }
    }
}

impl std::fmt::Display for CancelOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a user stands for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Participation {
    Registered { seat_number: i32 },
    Waitlisted { position: i32 },
    None,
}

/// Full ledger view of one event, seats by number and waitlist by position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRoster {
    pub event: Event,
    pub capacity: CapacitySummary,
    pub registrations: Vec<Registration>,
    pub waitlist: Vec<WaitlistEntry>,
}

impl EventRoster {
    pub fn participation(&self, user_id: i64) -> Participation {
        if let Some(r) = self.registrations.iter().find(|r| r.user_id == user_id) {
            return Participation::Registered { seat_number: r.seat_number };
        }
        if let Some(w) = self.waitlist.iter().find(|w| w.user_id == user_id) {
            return Participation::Waitlisted { position: w.position };
        }
        Participation::None
    }
}

/// Which events a user's enrollments are listed for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentScope {
    #[default]
    All,
    /// Only events starting now or later
    Upcoming,
}

/// Every seat and waitlist slot a user holds, across events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserEnrollments {
    pub registrations: Vec<Registration>,
    pub waitlist: Vec<WaitlistEntry>,
}
