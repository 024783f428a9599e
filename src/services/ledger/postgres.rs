//! Postgres-backed capacity ledger

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use chrono::Utc;
use crate::models::{EnrollmentScope, Event, EventRoster, Participation, Registration, User, UserEnrollments, WaitlistEntry};
use crate::services::ledger::{LedgerStore, LedgerTransaction};
use crate::utils::errors::{SeatwiseError, Result};

const EVENT_COLUMNS: &str =
    "id, title, starts_at, max_seats, max_waitlist, is_active, created_at, updated_at";
const REGISTRATION_COLUMNS: &str = "id, event_id, user_id, seat_number, registered_at";
const WAITLIST_COLUMNS: &str = "id, event_id, user_id, position, joined_at";

#[derive(Clone, Debug)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_event(&self, event_id: i64) -> Result<Event> {
        sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(SeatwiseError::EventNotFound { event_id })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTransaction;

    async fn begin(&self) -> Result<PgLedgerTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PgLedgerTransaction { tx })
    }

    async fn roster(&self, event_id: i64) -> Result<EventRoster> {
        let event = self.load_event(event_id).await?;

        let registrations = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE event_id = $1 ORDER BY seat_number ASC",
            REGISTRATION_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let waitlist = sqlx::query_as::<_, WaitlistEntry>(&format!(
            "SELECT {} FROM waitlist_entries WHERE event_id = $1 ORDER BY position ASC",
            WAITLIST_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let capacity = event.capacity(registrations.len() as i64, waitlist.len() as i64);
        Ok(EventRoster {
            event,
            capacity,
            registrations,
            waitlist,
        })
    }

    async fn participation(&self, event_id: i64, user_id: i64) -> Result<Participation> {
        let seat: Option<(i32,)> = sqlx::query_as(
            "SELECT seat_number FROM registrations WHERE event_id = $1 AND user_id = $2"
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some((seat_number,)) = seat {
            return Ok(Participation::Registered { seat_number });
        }

        let position: Option<(i32,)> = sqlx::query_as(
            "SELECT position FROM waitlist_entries WHERE event_id = $1 AND user_id = $2"
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match position {
            Some((position,)) => Participation::Waitlisted { position },
            None => Participation::None,
        })
    }

    async fn user_enrollments(&self, user_id: i64, scope: EnrollmentScope) -> Result<UserEnrollments> {
        let upcoming_only = scope == EnrollmentScope::Upcoming;

        let registrations = sqlx::query_as::<_, Registration>(&format!(
            r#"
            SELECT {} FROM registrations
            WHERE user_id = $1
              AND (NOT $2 OR event_id IN (SELECT id FROM events WHERE starts_at >= NOW()))
            ORDER BY registered_at ASC
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(user_id)
        .bind(upcoming_only)
        .fetch_all(&self.pool)
        .await?;

        let waitlist = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            SELECT {} FROM waitlist_entries
            WHERE user_id = $1
              AND (NOT $2 OR event_id IN (SELECT id FROM events WHERE starts_at >= NOW()))
            ORDER BY joined_at ASC
            "#,
            WAITLIST_COLUMNS
        ))
        .bind(user_id)
        .bind(upcoming_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(UserEnrollments { registrations, waitlist })
    }
}

/// Open Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn lock_event(&mut self, event_id: i64) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = $1 FOR UPDATE",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(event)
    }

    async fn find_user(&mut self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, is_blocked, created_at, updated_at FROM users WHERE id = $1"
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn find_registration(&mut self, event_id: i64, user_id: i64) -> Result<Option<Registration>> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            "SELECT {} FROM registrations WHERE event_id = $1 AND user_id = $2",
            REGISTRATION_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(registration)
    }

    async fn find_waitlist_entry(&mut self, event_id: i64, user_id: i64) -> Result<Option<WaitlistEntry>> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            "SELECT {} FROM waitlist_entries WHERE event_id = $1 AND user_id = $2",
            WAITLIST_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn registered_count(&mut self, event_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count.0)
    }

    async fn waitlist_count(&mut self, event_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM waitlist_entries WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count.0)
    }

    async fn allocate_seat_number(&mut self, event_id: i64) -> Result<i32> {
        let seat: (i32,) = sqlx::query_as(
            r#"
            UPDATE events
            SET seat_high_water = GREATEST(
                    seat_high_water,
                    COALESCE((SELECT MAX(seat_number) FROM registrations WHERE event_id = $1), 0)
                ) + 1
            WHERE id = $1
            RETURNING seat_high_water
            "#
        )
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(seat.0)
    }

    async fn next_waitlist_position(&mut self, event_id: i64) -> Result<i32> {
        let position: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM waitlist_entries WHERE event_id = $1"
        )
        .bind(event_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(position.0)
    }

    async fn insert_registration(&mut self, event_id: i64, user_id: i64, seat_number: i32) -> Result<Registration> {
        let registration = sqlx::query_as::<_, Registration>(&format!(
            r#"
            INSERT INTO registrations (event_id, user_id, seat_number, registered_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            REGISTRATION_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(seat_number)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(registration)
    }

    async fn insert_waitlist_entry(&mut self, event_id: i64, user_id: i64, position: i32) -> Result<WaitlistEntry> {
        let entry = sqlx::query_as::<_, WaitlistEntry>(&format!(
            r#"
            INSERT INTO waitlist_entries (event_id, user_id, position, joined_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            WAITLIST_COLUMNS
        ))
        .bind(event_id)
        .bind(user_id)
        .bind(position)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn delete_registration(&mut self, registration_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(registration_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_waitlist_entry(&mut self, entry_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM waitlist_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn waitlist_entries(&mut self, event_id: i64) -> Result<Vec<WaitlistEntry>> {
        let entries = sqlx::query_as::<_, WaitlistEntry>(&format!(
            "SELECT {} FROM waitlist_entries WHERE event_id = $1 ORDER BY position ASC",
            WAITLIST_COLUMNS
        ))
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(entries)
    }

    async fn set_waitlist_position(&mut self, entry_id: i64, position: i32) -> Result<()> {
        sqlx::query("UPDATE waitlist_entries SET position = $2 WHERE id = $1")
            .bind(entry_id)
            .bind(position)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
