//! Event repository implementation
//!
//! Seats and waitlist rows are never written here. Those go through the
//! admission engine, which holds the event lock.

use sqlx::PgPool;
use chrono::Utc;
use crate::config::AdmissionConfig;
use crate::models::event::{Event, CreateEventRequest};
use crate::utils::errors::SeatwiseError;

const EVENT_COLUMNS: &str =
    "id, title, starts_at, max_seats, max_waitlist, is_active, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct EventRepository {
    pool: PgPool,
    defaults: AdmissionConfig,
}

impl EventRepository {
    pub fn new(pool: PgPool, defaults: AdmissionConfig) -> Self {
        Self { pool, defaults }
    }

    /// Create a new event after checking capacity limits and schedule
    pub async fn create(&self, request: CreateEventRequest) -> Result<Event, SeatwiseError> {
        let now = Utc::now();
        let valid = request.validate(now, &self.defaults)?;

        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, starts_at, max_seats, max_waitlist, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, true, $5, $6)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(valid.title)
        .bind(valid.starts_at)
        .bind(valid.max_seats)
        .bind(valid.max_waitlist)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(event_id = event.id, max_seats = event.max_seats, max_waitlist = event.max_waitlist, "Event created");
        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, SeatwiseError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE id = $1",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Get upcoming active events
    pub async fn list_upcoming(&self, limit: Option<i64>) -> Result<Vec<Event>, SeatwiseError> {
        let limit = limit.unwrap_or(50);
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE starts_at > NOW() AND is_active = true ORDER BY starts_at ASC LIMIT $1",
            EVENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Toggle the active flag
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<Event, SeatwiseError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET is_active = $2, updated_at = $3
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(is_active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        event.ok_or(SeatwiseError::EventNotFound { event_id: id })
    }

    /// Delete event together with its registrations and waitlist
    pub async fn delete(&self, id: i64) -> Result<(), SeatwiseError> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
