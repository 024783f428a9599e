//! In-memory capacity ledger
//!
//! Transactions are fully serialized: `begin` takes the store mutex and
//! works on a private copy of the ledger that replaces the shared one only on
//! `commit`. Unique constraints mirror the relational schema so constraint
//! violations surface the same way they would in Postgres.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::config::AdmissionConfig;
use crate::models::{
    CreateEventRequest, CreateUserRequest, EnrollmentScope, Event, EventRoster, Participation, Registration, User,
    UserEnrollments, WaitlistEntry,
};
use crate::services::ledger::{LedgerStore, LedgerTransaction};
use crate::utils::errors::{SeatwiseError, Result};

/// Transaction step that fails on purpose, for exercising rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    InsertRegistration,
    InsertWaitlistEntry,
    DeleteRegistration,
    SetWaitlistPosition,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    users: BTreeMap<i64, User>,
    events: BTreeMap<i64, Event>,
    seat_high_water: HashMap<i64, i32>,
    registrations: BTreeMap<i64, Registration>,
    waitlist: BTreeMap<i64, WaitlistEntry>,
    last_id: i64,
}

impl LedgerState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn event(&self, event_id: i64) -> Result<&Event> {
        self.events
            .get(&event_id)
            .ok_or(SeatwiseError::EventNotFound { event_id })
    }

    fn event_registrations(&self, event_id: i64) -> Vec<Registration> {
        let mut rows: Vec<_> = self
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.seat_number);
        rows
    }

    fn event_waitlist(&self, event_id: i64) -> Vec<WaitlistEntry> {
        let mut rows: Vec<_> = self
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id)
            .cloned()
            .collect();
        rows.sort_by_key(|w| w.position);
        rows
    }
}

#[derive(Debug, Default)]
struct Inner {
    ledger: LedgerState,
    fail_point: Option<FailPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let ledger = &mut inner.ledger;
        if ledger.users.values().any(|u| u.username == request.username) {
            return Err(unique_violation("users_username_key"));
        }

        let now = Utc::now();
        let user = User {
            id: ledger.next_id(),
            username: request.username,
            is_blocked: request.is_blocked,
            created_at: now,
            updated_at: now,
        };
        ledger.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub async fn set_blocked(&self, user_id: i64, is_blocked: bool) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .ledger
            .users
            .get_mut(&user_id)
            .ok_or(SeatwiseError::UserNotFound { user_id })?;
        user.is_blocked = is_blocked;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    pub async fn create_event(&self, request: CreateEventRequest, defaults: &AdmissionConfig) -> Result<Event> {
        let now = Utc::now();
        let valid = request.validate(now, defaults)?;

        let mut inner = self.inner.lock().await;
        let ledger = &mut inner.ledger;
        let event = Event {
            id: ledger.next_id(),
            title: valid.title,
            starts_at: valid.starts_at,
            max_seats: valid.max_seats,
            max_waitlist: valid.max_waitlist,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        ledger.events.insert(event.id, event.clone());
        Ok(event)
    }

    /// Remove an event with all of its seats and waitlist entries
    pub async fn delete_event(&self, event_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let ledger = &mut inner.ledger;
        ledger.events.remove(&event_id);
        ledger.seat_high_water.remove(&event_id);
        ledger.registrations.retain(|_, r| r.event_id != event_id);
        ledger.waitlist.retain(|_, w| w.event_id != event_id);
        Ok(())
    }

    /// Make the next transaction that reaches `point` fail
    pub async fn fail_at(&self, point: FailPoint) {
        self.inner.lock().await.fail_point = Some(point);
    }

    pub async fn clear_fail_point(&self) {
        self.inner.lock().await.fail_point = None;
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.inner.clone().lock_owned().await;
        let working = guard.ledger.clone();
        Ok(InMemoryTransaction { guard, working })
    }

    async fn roster(&self, event_id: i64) -> Result<EventRoster> {
        let inner = self.inner.lock().await;
        let ledger = &inner.ledger;
        let event = ledger.event(event_id)?.clone();
        let registrations = ledger.event_registrations(event_id);
        let waitlist = ledger.event_waitlist(event_id);
        let capacity = event.capacity(registrations.len() as i64, waitlist.len() as i64);

        Ok(EventRoster {
            event,
            capacity,
            registrations,
            waitlist,
        })
    }

    async fn participation(&self, event_id: i64, user_id: i64) -> Result<Participation> {
        let inner = self.inner.lock().await;
        let ledger = &inner.ledger;
        if let Some(r) = ledger
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.user_id == user_id)
        {
            return Ok(Participation::Registered { seat_number: r.seat_number });
        }
        if let Some(w) = ledger
            .waitlist
            .values()
            .find(|w| w.event_id == event_id && w.user_id == user_id)
        {
            return Ok(Participation::Waitlisted { position: w.position });
        }
        Ok(Participation::None)
    }

    async fn user_enrollments(&self, user_id: i64, scope: EnrollmentScope) -> Result<UserEnrollments> {
        let inner = self.inner.lock().await;
        let ledger = &inner.ledger;
        let now = Utc::now();
        let in_scope = |event_id: i64| match scope {
            EnrollmentScope::All => true,
            EnrollmentScope::Upcoming => ledger
                .events
                .get(&event_id)
                .map_or(false, |event| event.starts_at >= now),
        };

        Ok(UserEnrollments {
            registrations: ledger
                .registrations
                .values()
                .filter(|r| r.user_id == user_id && in_scope(r.event_id))
                .cloned()
                .collect(),
            waitlist: ledger
                .waitlist
                .values()
                .filter(|w| w.user_id == user_id && in_scope(w.event_id))
                .cloned()
                .collect(),
        })
    }
}

/// Exclusive transaction over the in-memory ledger
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Inner>,
    working: LedgerState,
}

impl InMemoryTransaction {
    fn check(&mut self, point: FailPoint) -> Result<()> {
        if self.guard.fail_point == Some(point) {
            self.guard.fail_point = None;
            return Err(SeatwiseError::Database(sqlx::Error::Protocol(format!(
                "injected failure at {:?}",
                point
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_event(&mut self, event_id: i64) -> Result<Option<Event>> {
        Ok(self.working.events.get(&event_id).cloned())
    }

    async fn find_user(&mut self, user_id: i64) -> Result<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn find_registration(&mut self, event_id: i64, user_id: i64) -> Result<Option<Registration>> {
        Ok(self
            .working
            .registrations
            .values()
            .find(|r| r.event_id == event_id && r.user_id == user_id)
            .cloned())
    }

    async fn find_waitlist_entry(&mut self, event_id: i64, user_id: i64) -> Result<Option<WaitlistEntry>> {
        Ok(self
            .working
            .waitlist
            .values()
            .find(|w| w.event_id == event_id && w.user_id == user_id)
            .cloned())
    }

    async fn registered_count(&mut self, event_id: i64) -> Result<i64> {
        Ok(self.working.registrations.values().filter(|r| r.event_id == event_id).count() as i64)
    }

    async fn waitlist_count(&mut self, event_id: i64) -> Result<i64> {
        Ok(self.working.waitlist.values().filter(|w| w.event_id == event_id).count() as i64)
    }

    async fn allocate_seat_number(&mut self, event_id: i64) -> Result<i32> {
        let highest_held = self
            .working
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .map(|r| r.seat_number)
            .max()
            .unwrap_or(0);
        let high_water = self.working.seat_high_water.entry(event_id).or_insert(0);
        *high_water = (*high_water).max(highest_held) + 1;
        Ok(*high_water)
    }

    async fn next_waitlist_position(&mut self, event_id: i64) -> Result<i32> {
        let highest = self
            .working
            .waitlist
            .values()
            .filter(|w| w.event_id == event_id)
            .map(|w| w.position)
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }

    async fn insert_registration(&mut self, event_id: i64, user_id: i64, seat_number: i32) -> Result<Registration> {
        self.check(FailPoint::InsertRegistration)?;
        self.working.event(event_id)?;
        if !self.working.users.contains_key(&user_id) {
            return Err(SeatwiseError::UserNotFound { user_id });
        }
        let taken = self.working.registrations.values().any(|r| {
            r.event_id == event_id && (r.user_id == user_id || r.seat_number == seat_number)
        });
        if taken {
            return Err(unique_violation("registrations_event_user_key/registrations_event_seat_key"));
        }

        let registration = Registration {
            id: self.working.next_id(),
            event_id,
            user_id,
            seat_number,
            registered_at: Utc::now(),
        };
        self.working.registrations.insert(registration.id, registration.clone());
        Ok(registration)
    }

    async fn insert_waitlist_entry(&mut self, event_id: i64, user_id: i64, position: i32) -> Result<WaitlistEntry> {
        self.check(FailPoint::InsertWaitlistEntry)?;
        self.working.event(event_id)?;
        if !self.working.users.contains_key(&user_id) {
            return Err(SeatwiseError::UserNotFound { user_id });
        }
        let taken = self.working.waitlist.values().any(|w| {
            w.event_id == event_id && (w.user_id == user_id || w.position == position)
        });
        if taken {
            return Err(unique_violation("waitlist_entries_event_user_key/waitlist_entries_event_position_key"));
        }

        let entry = WaitlistEntry {
            id: self.working.next_id(),
            event_id,
            user_id,
            position,
            joined_at: Utc::now(),
        };
        self.working.waitlist.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn delete_registration(&mut self, registration_id: i64) -> Result<()> {
        self.check(FailPoint::DeleteRegistration)?;
        self.working.registrations.remove(&registration_id);
        Ok(())
    }

    async fn delete_waitlist_entry(&mut self, entry_id: i64) -> Result<()> {
        self.working.waitlist.remove(&entry_id);
        Ok(())
    }

    async fn waitlist_entries(&mut self, event_id: i64) -> Result<Vec<WaitlistEntry>> {
        Ok(self.working.event_waitlist(event_id))
    }

    async fn set_waitlist_position(&mut self, entry_id: i64, position: i32) -> Result<()> {
        self.check(FailPoint::SetWaitlistPosition)?;
        let event_id = match self.working.waitlist.get(&entry_id) {
            Some(entry) => entry.event_id,
            None => return Ok(()),
        };
        let collides = self
            .working
            .waitlist
            .values()
            .any(|w| w.id != entry_id && w.event_id == event_id && w.position == position);
        if collides {
            return Err(unique_violation("waitlist_entries_event_position_key"));
        }
        if let Some(entry) = self.working.waitlist.get_mut(&entry_id) {
            entry.position = position;
        }
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        self.check(FailPoint::Commit)?;
        let InMemoryTransaction { mut guard, working } = self;
        guard.ledger = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

fn unique_violation(constraint: &str) -> SeatwiseError {
    SeatwiseError::Database(sqlx::Error::Protocol(format!(
        "duplicate key value violates unique constraint \"{}\"",
        constraint
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn defaults() -> AdmissionConfig {
        AdmissionConfig {
            default_max_seats: 2,
            default_max_waitlist: 2,
        }
    }

    async fn seeded() -> (InMemoryLedgerStore, Event, User) {
        let store = InMemoryLedgerStore::new();
        let event = store
            .create_event(
                CreateEventRequest {
                    title: "Balboa night".to_string(),
                    starts_at: Utc::now() + Duration::days(1),
                    max_seats: None,
                    max_waitlist: None,
                },
                &defaults(),
            )
            .await
            .unwrap();
        let user = store.create_user(CreateUserRequest::new("ada")).await.unwrap();
        (store, event, user)
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let (store, event, user) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(event.id, user.id, 1).await.unwrap();
        drop(tx);

        let roster = store.roster(event.id).await.unwrap();
        assert!(roster.registrations.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let (store, event, user) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_waitlist_entry(event.id, user.id, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store.participation(event.id, user.id).await.unwrap(),
            Participation::Waitlisted { position: 1 }
        );
    }

    #[tokio::test]
    async fn test_unique_seat_per_event() {
        let (store, event, user) = seeded().await;
        let other = store.create_user(CreateUserRequest::new("grace")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(event.id, user.id, 1).await.unwrap();
        assert!(tx.insert_registration(event.id, other.id, 1).await.is_err());
        assert!(tx.insert_registration(event.id, user.id, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_seat_numbers_never_reused() {
        let (store, event, user) = seeded().await;

        let mut tx = store.begin().await.unwrap();
        let first = tx.allocate_seat_number(event.id).await.unwrap();
        let reg = tx.insert_registration(event.id, user.id, first).await.unwrap();
        tx.delete_registration(reg.id).await.unwrap();
        let second = tx.allocate_seat_number(event.id).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_fail_point_fires_once() {
        let (store, event, user) = seeded().await;
        store.fail_at(FailPoint::InsertRegistration).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_registration(event.id, user.id, 1).await.is_err());
        assert!(tx.insert_registration(event.id, user.id, 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleared_fail_point_never_fires() {
        let (store, event, user) = seeded().await;
        store.fail_at(FailPoint::Commit).await;
        store.clear_fail_point().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_registration(event.id, user.id, 1).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.roster(event.id).await.unwrap().registrations.len(), 1);
    }
}
