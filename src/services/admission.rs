//! Admission engine
//!
//! `register` and `cancel` run under the per-event gate and inside one ledger
//! transaction that starts with an exclusive read of the event row. Either
//! the whole state transition commits, or nothing does.

use tracing::warn;
use crate::models::{
    CancelOutcome, EnrollmentScope, EventRoster, Participation, Promotion, RegisterOutcome, UserEnrollments,
    WaitlistEntry,
};
use crate::services::gate::EventGate;
use crate::services::ledger::{LedgerStore, LedgerTransaction};
use crate::services::lock::LockService;
use crate::utils::errors::{SeatwiseError, Result};
use crate::utils::logging::{log_admission, log_admission_failure, log_promotion};

/// New position for one waitlist entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionChange {
    pub entry_id: i64,
    pub from: i32,
    pub to: i32,
}

/// Compute the writes that make the waitlist dense again.
///
/// Entries keep their relative order and get positions 1..=n. Only entries
/// whose position changes are returned, in ascending order of the new
/// position, so applying them one by one never collides with the
/// `(event, position)` unique constraint. A dense waitlist yields no writes.
pub fn plan_renumbering(entries: &[WaitlistEntry]) -> Vec<PositionChange> {
    let mut ordered: Vec<&WaitlistEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.position);

    ordered
        .into_iter()
        .zip(1..)
        .filter(|(entry, to)| entry.position != *to)
        .map(|(entry, to)| PositionChange {
            entry_id: entry.id,
            from: entry.position,
            to,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AdmissionEngine<S, L> {
    store: S,
    gate: EventGate<L>,
}

impl<S, L> AdmissionEngine<S, L>
where
    S: LedgerStore,
    L: LockService,
{
    pub fn new(store: S, gate: EventGate<L>) -> Self {
        Self { store, gate }
    }

    pub fn gate(&self) -> &EventGate<L> {
        &self.gate
    }

    /// Take a seat, or a waitlist slot when seats are gone
    pub async fn register(&self, event_id: i64, user_id: i64) -> Result<RegisterOutcome> {
        let result = self
            .gate
            .with_event_lock(event_id, self.in_transaction(|tx| Box::pin(admit(tx, event_id, user_id))))
            .await;

        match &result {
            Ok(outcome) => log_admission(event_id, user_id, "register", outcome.as_str()),
            Err(e) => log_admission_failure(event_id, user_id, "register", e),
        }
        result
    }

    /// Give up a seat or waitlist slot, promoting the head of the waitlist
    /// into a freed seat
    pub async fn cancel(&self, event_id: i64, user_id: i64) -> Result<CancelOutcome> {
        let result = self
            .gate
            .with_event_lock(event_id, self.in_transaction(|tx| Box::pin(withdraw(tx, event_id, user_id))))
            .await;

        match &result {
            Ok(outcome) => log_admission(event_id, user_id, "cancel", outcome.as_str()),
            Err(e) => log_admission_failure(event_id, user_id, "cancel", e),
        }
        result
    }

    pub async fn roster(&self, event_id: i64) -> Result<EventRoster> {
        self.store.roster(event_id).await
    }

    pub async fn participation(&self, event_id: i64, user_id: i64) -> Result<Participation> {
        self.store.participation(event_id, user_id).await
    }

    pub async fn user_enrollments(&self, user_id: i64, scope: EnrollmentScope) -> Result<UserEnrollments> {
        self.store.user_enrollments(user_id, scope).await
    }

    /// Run `op` in a fresh transaction; commit on success, roll back on error
    async fn in_transaction<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut S::Tx) -> futures::future::BoxFuture<'t, Result<T>>,
    {
        let mut tx = self.store.begin().await?;
        match op(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(error = %rollback_error, "Rollback failed; dropping transaction");
                }
                Err(e)
            }
        }
    }
}

async fn admit<T: LedgerTransaction>(tx: &mut T, event_id: i64, user_id: i64) -> Result<RegisterOutcome> {
    let event = tx
        .lock_event(event_id)
        .await?
        .ok_or(SeatwiseError::EventNotFound { event_id })?;
    let user = tx
        .find_user(user_id)
        .await?
        .ok_or(SeatwiseError::UserNotFound { user_id })?;

    if user.is_blocked {
        return Err(SeatwiseError::UserBlocked { user_id });
    }
    if let Some(registration) = tx.find_registration(event_id, user_id).await? {
        return Ok(RegisterOutcome::AlreadyRegistered { seat_number: registration.seat_number });
    }
    if let Some(entry) = tx.find_waitlist_entry(event_id, user_id).await? {
        return Ok(RegisterOutcome::AlreadyInWaitlist { position: entry.position });
    }

    let registered = tx.registered_count(event_id).await?;
    let waiting = tx.waitlist_count(event_id).await?;
    let capacity = event.capacity(registered, waiting);

    if capacity.has_free_seat() {
        let seat_number = tx.allocate_seat_number(event_id).await?;
        tx.insert_registration(event_id, user_id, seat_number).await?;
        return Ok(RegisterOutcome::Registered { seat_number });
    }
    if capacity.has_free_waitlist_slot() {
        let position = tx.next_waitlist_position(event_id).await?;
        tx.insert_waitlist_entry(event_id, user_id, position).await?;
        return Ok(RegisterOutcome::Waitlisted { position });
    }

    Err(SeatwiseError::NoAvailableSeats { event_id })
}

async fn withdraw<T: LedgerTransaction>(tx: &mut T, event_id: i64, user_id: i64) -> Result<CancelOutcome> {
    let event = tx
        .lock_event(event_id)
        .await?
        .ok_or(SeatwiseError::EventNotFound { event_id })?;
    tx.find_user(user_id)
        .await?
        .ok_or(SeatwiseError::UserNotFound { user_id })?;

    if let Some(registration) = tx.find_registration(event_id, user_id).await? {
        tx.delete_registration(registration.id).await?;

        // Limits may have been lowered below the current head count; only
        // promote into a seat that is actually free.
        let registered = tx.registered_count(event_id).await?;
        let promoted = if registered < i64::from(event.max_seats) {
            promote_from_waitlist(tx, event_id).await?
        } else {
            None
        };
        return Ok(CancelOutcome::RegistrationCanceled { promoted });
    }

    if let Some(entry) = tx.find_waitlist_entry(event_id, user_id).await? {
        tx.delete_waitlist_entry(entry.id).await?;
        let remaining = tx.waitlist_entries(event_id).await?;
        apply_renumbering(tx, &remaining).await?;
        return Ok(CancelOutcome::WaitlistCanceled);
    }

    Ok(CancelOutcome::NotRegistered)
}

async fn promote_from_waitlist<T: LedgerTransaction>(tx: &mut T, event_id: i64) -> Result<Option<Promotion>> {
    let queue = tx.waitlist_entries(event_id).await?;
    let Some((head, rest)) = queue.split_first() else {
        return Ok(None);
    };

    tx.delete_waitlist_entry(head.id).await?;
    let seat_number = tx.allocate_seat_number(event_id).await?;
    tx.insert_registration(event_id, head.user_id, seat_number).await?;
    let renumbered = apply_renumbering(tx, rest).await?;

    log_promotion(event_id, head.user_id, seat_number, renumbered);
    Ok(Some(Promotion {
        user_id: head.user_id,
        seat_number,
    }))
}

async fn apply_renumbering<T: LedgerTransaction>(tx: &mut T, entries: &[WaitlistEntry]) -> Result<usize> {
    let changes = plan_renumbering(entries);
    for change in &changes {
        tx.set_waitlist_position(change.entry_id, change.to).await?;
    }
    Ok(changes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn entry(id: i64, position: i32) -> WaitlistEntry {
        WaitlistEntry {
            id,
            event_id: 1,
            user_id: id * 10,
            position,
            joined_at: Utc::now(),
        }
    }

    fn apply(entries: &[WaitlistEntry], changes: &[PositionChange]) -> Vec<WaitlistEntry> {
        entries
            .iter()
            .map(|e| {
                let mut e = e.clone();
                if let Some(c) = changes.iter().find(|c| c.entry_id == e.id) {
                    e.position = c.to;
                }
                e
            })
            .collect()
    }

    #[test]
    fn test_closes_gap_after_removal() {
        let entries = vec![entry(1, 1), entry(3, 3), entry(4, 4)];
        let changes = plan_renumbering(&entries);
        assert_eq!(
            changes,
            vec![
                PositionChange { entry_id: 3, from: 3, to: 2 },
                PositionChange { entry_id: 4, from: 4, to: 3 },
            ]
        );
    }

    #[test]
    fn test_dense_waitlist_needs_no_writes() {
        let entries = vec![entry(1, 1), entry(2, 2), entry(3, 3)];
        assert!(plan_renumbering(&entries).is_empty());
        assert!(plan_renumbering(&[]).is_empty());
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let entries = vec![entry(9, 7), entry(5, 2), entry(6, 4)];
        let changes = plan_renumbering(&entries);
        let renumbered = apply(&entries, &changes);
        let position_of = |id| renumbered.iter().find(|e| e.id == id).unwrap().position;
        assert_eq!(position_of(5), 1);
        assert_eq!(position_of(6), 2);
        assert_eq!(position_of(9), 3);
    }

    fn distinct_positions() -> impl Strategy<Value = Vec<WaitlistEntry>> {
        proptest::collection::btree_set(1i32..500, 0..40).prop_map(|positions| {
            positions
                .into_iter()
                .rev()
                .enumerate()
                .map(|(i, p)| entry(i as i64 + 1, p))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_renumbering_is_dense(entries in distinct_positions()) {
            let renumbered = apply(&entries, &plan_renumbering(&entries));
            let mut positions: Vec<i32> = renumbered.iter().map(|e| e.position).collect();
            positions.sort_unstable();
            let expected: Vec<i32> = (1..=entries.len() as i32).collect();
            prop_assert_eq!(positions, expected);
        }

        #[test]
        fn prop_renumbering_is_idempotent(entries in distinct_positions()) {
            let once = apply(&entries, &plan_renumbering(&entries));
            prop_assert!(plan_renumbering(&once).is_empty());
        }

        #[test]
        fn prop_renumbering_is_stable(entries in distinct_positions()) {
            let renumbered = apply(&entries, &plan_renumbering(&entries));
            for a in &entries {
                for b in &entries {
                    let new_a = renumbered.iter().find(|e| e.id == a.id).unwrap().position;
                    let new_b = renumbered.iter().find(|e| e.id == b.id).unwrap().position;
                    prop_assert_eq!(a.position < b.position, new_a < new_b);
                }
            }
        }

        #[test]
        fn prop_writes_never_collide(entries in distinct_positions()) {
            let mut current = entries.clone();
            for change in plan_renumbering(&entries) {
                prop_assert!(current.iter().all(|e| e.id == change.entry_id || e.position != change.to));
                if let Some(e) = current.iter_mut().find(|e| e.id == change.entry_id) {
                    e.position = change.to;
                }
            }
        }
    }
}
