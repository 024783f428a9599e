//! Per-event mutual-exclusion gate
//!
//! Register and cancel on the same event share ONE lock key. Keying the two
//! operations separately would let a cancel's promotion race a register and
//! hand out the same seat number twice.

use std::future::Future;
use std::time::{Duration, Instant};
use rand::Rng;
use tracing::warn;
use crate::config::LockConfig;
use crate::services::lock::{LockLease, LockService};
use crate::utils::errors::{SeatwiseError, Result};
use crate::utils::logging::log_lock_event;

/// Timing of lock acquisition and lease length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub acquire_timeout: Duration,
    pub lease: Duration,
    pub retry_interval: Duration,
}

impl From<&LockConfig> for LockPolicy {
    fn from(config: &LockConfig) -> Self {
        Self {
            acquire_timeout: config.acquire_timeout(),
            lease: config.lease(),
            retry_interval: config.retry_interval(),
        }
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
            lease: Duration::from_secs(10),
            retry_interval: Duration::from_millis(25),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventGate<L> {
    locks: L,
    prefix: String,
    policy: LockPolicy,
}

impl<L: LockService> EventGate<L> {
    pub fn new(locks: L, prefix: impl Into<String>, policy: LockPolicy) -> Self {
        Self {
            locks,
            prefix: prefix.into(),
            policy,
        }
    }

    pub fn locks(&self) -> &L {
        &self.locks
    }

    /// Lock key shared by every admission-affecting operation on `event_id`
    pub fn key_for(&self, event_id: i64) -> String {
        format!("{}event:{}:admission", self.prefix, event_id)
    }

    /// Wait for the event lock, polling with jitter until the acquire
    /// timeout elapses
    pub async fn acquire(&self, event_id: i64) -> Result<LockLease> {
        let key = self.key_for(event_id);
        let started = Instant::now();

        loop {
            if let Some(lease) = self.locks.try_acquire(&key, self.policy.lease).await? {
                log_lock_event(&key, "acquired", elapsed_ms(started));
                return Ok(lease);
            }

            let waited = started.elapsed();
            if waited >= self.policy.acquire_timeout {
                log_lock_event(&key, "timed_out", elapsed_ms(started));
                return Err(SeatwiseError::LockTimeout {
                    event_id,
                    waited_ms: elapsed_ms(started),
                });
            }

            let remaining = self.policy.acquire_timeout - waited;
            tokio::time::sleep(self.backoff().min(remaining)).await;
        }
    }

    /// Release a lease. Failures are logged; the lease expires regardless.
    pub async fn release(&self, lease: &LockLease) {
        match self.locks.release(lease).await {
            Ok(true) => log_lock_event(&lease.key, "released", lease.held_for().as_millis() as u64),
            Ok(false) => warn!(
                key = %lease.key,
                held_ms = lease.held_for().as_millis() as u64,
                "Admission lease had already expired before release"
            ),
            Err(e) => warn!(key = %lease.key, error = %e, "Failed to release admission lease"),
        }
    }

    /// Run `op` while holding the lock for `event_id`.
    ///
    /// The lease is released on every path `op` returns through. If the
    /// returned future is dropped midway the lease is left to expire.
    pub async fn with_event_lock<T, Fut>(&self, event_id: i64, op: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let lease = self.acquire(event_id).await?;
        let result = op.await;
        self.release(&lease).await;
        result
    }

    fn backoff(&self) -> Duration {
        let base = self.policy.retry_interval.as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
