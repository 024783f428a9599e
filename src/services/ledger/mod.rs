//! Capacity ledger storage
//!
//! The admission engine only talks to storage through these traits, so it
//! can run against Postgres in production and an in-memory ledger in tests.
//! Every write happens inside a [`LedgerTransaction`]; nothing is visible to
//! other transactions until `commit`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use crate::models::{EnrollmentScope, Event, EventRoster, Participation, Registration, User, UserEnrollments, WaitlistEntry};
use crate::utils::errors::Result;

pub use memory::{InMemoryLedgerStore, InMemoryTransaction, FailPoint};
pub use postgres::{PgLedgerStore, PgLedgerTransaction};

/// Source of ledger transactions and read-only ledger views
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTransaction;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn roster(&self, event_id: i64) -> Result<EventRoster>;

    async fn participation(&self, event_id: i64, user_id: i64) -> Result<Participation>;

    async fn user_enrollments(&self, user_id: i64, scope: EnrollmentScope) -> Result<UserEnrollments>;
}

/// Row-level operations on the ledger inside one atomic transaction
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Read the event row exclusively. Concurrent transactions calling this
    /// for the same event block until this one ends.
    async fn lock_event(&mut self, event_id: i64) -> Result<Option<Event>>;

    async fn find_user(&mut self, user_id: i64) -> Result<Option<User>>;

    async fn find_registration(&mut self, event_id: i64, user_id: i64) -> Result<Option<Registration>>;

    async fn find_waitlist_entry(&mut self, event_id: i64, user_id: i64) -> Result<Option<WaitlistEntry>>;

    async fn registered_count(&mut self, event_id: i64) -> Result<i64>;

    async fn waitlist_count(&mut self, event_id: i64) -> Result<i64>;

    /// Reserve the next seat number: one past the highest number ever
    /// issued for the event, so numbers freed by cancellation stay retired
    async fn allocate_seat_number(&mut self, event_id: i64) -> Result<i32>;

    /// Highest waitlist position plus one, or 1
    async fn next_waitlist_position(&mut self, event_id: i64) -> Result<i32>;

    async fn insert_registration(&mut self, event_id: i64, user_id: i64, seat_number: i32) -> Result<Registration>;

    async fn insert_waitlist_entry(&mut self, event_id: i64, user_id: i64, position: i32) -> Result<WaitlistEntry>;

    async fn delete_registration(&mut self, registration_id: i64) -> Result<()>;

    async fn delete_waitlist_entry(&mut self, entry_id: i64) -> Result<()>;

    /// Waitlist of the event ordered by position ascending
    async fn waitlist_entries(&mut self, event_id: i64) -> Result<Vec<WaitlistEntry>>;

    async fn set_waitlist_position(&mut self, entry_id: i64, position: i32) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
