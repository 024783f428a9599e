//! In-memory test context
//!
//! Wires an [`AdmissionEngine`] to [`InMemoryLedgerStore`] and
//! [`LocalLockService`] so engine behaviour can be tested without Postgres
//! or Redis.

use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use seatwise::config::AdmissionConfig;
use seatwise::models::{CreateEventRequest, CreateUserRequest, Event, EventRoster, User};
use seatwise::services::{AdmissionEngine, EventGate, InMemoryLedgerStore, LedgerStore, LocalLockService, LockPolicy};

pub type MemoryEngine = AdmissionEngine<InMemoryLedgerStore, LocalLockService>;

pub struct LedgerTestContext {
    pub store: InMemoryLedgerStore,
    pub locks: LocalLockService,
    pub engine: Arc<MemoryEngine>,
}

impl LedgerTestContext {
    pub fn new() -> Self {
        Self::with_policy(test_lock_policy())
    }

    pub fn with_policy(policy: LockPolicy) -> Self {
        let store = InMemoryLedgerStore::new();
        let locks = LocalLockService::new();
        let gate = EventGate::new(locks.clone(), "test:", policy);
        let engine = Arc::new(AdmissionEngine::new(store.clone(), gate));
        Self { store, locks, engine }
    }

    pub async fn event(&self, max_seats: i32, max_waitlist: i32) -> Event {
        self.event_starting_in(chrono::Duration::days(7), max_seats, max_waitlist).await
    }

    pub async fn event_starting_in(&self, delay: chrono::Duration, max_seats: i32, max_waitlist: i32) -> Event {
        self.store
            .create_event(
                CreateEventRequest {
                    title: format!("Social {}x{}", max_seats, max_waitlist),
                    starts_at: Utc::now() + delay,
                    max_seats: Some(max_seats),
                    max_waitlist: Some(max_waitlist),
                },
                &test_admission_defaults(),
            )
            .await
            .expect("Failed to create test event")
    }

    pub async fn user(&self, username: &str) -> User {
        self.store
            .create_user(CreateUserRequest::new(username))
            .await
            .expect("Failed to create test user")
    }

    pub async fn blocked_user(&self, username: &str) -> User {
        self.store
            .create_user(CreateUserRequest::new(username).blocked())
            .await
            .expect("Failed to create blocked test user")
    }

    pub async fn users(&self, prefix: &str, count: usize) -> Vec<User> {
        let mut users = Vec::with_capacity(count);
        for i in 0..count {
            users.push(self.user(&format!("{}{}", prefix, i)).await);
        }
        users
    }

    pub async fn roster(&self, event_id: i64) -> EventRoster {
        self.store.roster(event_id).await.expect("Failed to load roster")
    }
}

pub fn test_lock_policy() -> LockPolicy {
    LockPolicy {
        acquire_timeout: Duration::from_secs(10),
        lease: Duration::from_secs(30),
        retry_interval: Duration::from_millis(1),
    }
}

pub fn test_admission_defaults() -> AdmissionConfig {
    AdmissionConfig {
        default_max_seats: 10,
        default_max_waitlist: 5,
    }
}

/// Check every ledger invariant that must hold after any completed
/// register or cancel call
pub fn assert_ledger_invariants(roster: &EventRoster) {
    let event = &roster.event;
    assert!(
        roster.registrations.len() as i64 <= i64::from(event.max_seats),
        "{} registrations exceed {} seats",
        roster.registrations.len(),
        event.max_seats
    );
    assert!(
        roster.waitlist.len() as i64 <= i64::from(event.max_waitlist),
        "{} waitlist entries exceed {} slots",
        roster.waitlist.len(),
        event.max_waitlist
    );

    let positions: Vec<i32> = roster.waitlist.iter().map(|w| w.position).collect();
    let expected: Vec<i32> = (1..=roster.waitlist.len() as i32).collect();
    assert_eq!(positions, expected, "waitlist positions are not dense");

    let mut seats: Vec<i32> = roster.registrations.iter().map(|r| r.seat_number).collect();
    seats.sort_unstable();
    seats.dedup();
    assert_eq!(seats.len(), roster.registrations.len(), "duplicate seat numbers");

    for registration in &roster.registrations {
        assert!(
            roster.waitlist.iter().all(|w| w.user_id != registration.user_id),
            "user {} holds both a seat and a waitlist slot",
            registration.user_id
        );
    }

    assert_eq!(roster.capacity.registered_count, roster.registrations.len() as i64);
    assert_eq!(roster.capacity.waitlist_count, roster.waitlist.len() as i64);
}
