//! Lock services backing the per-event admission gate
//!
//! A lock is a lease: it names an opaque key, carries a random token that
//! only its holder knows, and expires on its own if the holder disappears.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;
use crate::utils::errors::Result;

/// Proof of holding a lock key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub token: String,
    pub acquired_at: Instant,
}

impl LockLease {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: Uuid::new_v4().to_string(),
            acquired_at: Instant::now(),
        }
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// Mutual exclusion keyed by an opaque string
#[async_trait]
pub trait LockService: Send + Sync {
    /// Take the key if nobody holds it. Returns `None` when it is taken.
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockLease>>;

    /// Give the key back. Releasing a lease that already expired or was
    /// released is a no-op and returns `false`.
    async fn release(&self, lease: &LockLease) -> Result<bool>;
}

#[async_trait]
impl<L: LockService + ?Sized> LockService for Arc<L> {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockLease>> {
        (**self).try_acquire(key, lease).await
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        (**self).release(lease).await
    }
}

/// Lock service chosen at runtime from configuration
pub type SharedLockService = Arc<dyn LockService>;

/// In-process lock table. Only serializes callers inside one process.
#[derive(Debug, Clone, Default)]
pub struct LocalLockService {
    held: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl LocalLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held and not expired
    pub async fn held_count(&self) -> usize {
        let now = Instant::now();
        self.held
            .lock()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }
}

#[async_trait]
impl LockService for LocalLockService {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockLease>> {
        let mut held = self.held.lock().await;
        let now = Instant::now();

        if let Some((_, expires_at)) = held.get(key) {
            if *expires_at > now {
                return Ok(None);
            }
        }

        let granted = LockLease::new(key);
        held.insert(key.to_string(), (granted.token.clone(), now + lease));
        Ok(Some(granted))
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        let mut held = self.held.lock().await;
        match held.get(&lease.key) {
            Some((token, _)) if *token == lease.token => {
                held.remove(&lease.key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_lock_is_exclusive() {
        let locks = LocalLockService::new();
        let first = locks.try_acquire("event:1", Duration::from_secs(5)).await.unwrap();
        assert!(first.is_some());
        assert!(locks.try_acquire("event:1", Duration::from_secs(5)).await.unwrap().is_none());
        assert!(locks.try_acquire("event:2", Duration::from_secs(5)).await.unwrap().is_some());
        assert_eq!(locks.held_count().await, 2);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let locks = LocalLockService::new();
        let lease = locks.try_acquire("event:1", Duration::from_secs(5)).await.unwrap().unwrap();
        assert!(locks.release(&lease).await.unwrap());
        assert!(!locks.release(&lease).await.unwrap());
        assert!(locks.try_acquire("event:1", Duration::from_secs(5)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_lease_cannot_release_new_holder() {
        let locks = LocalLockService::new();
        let stale = locks.try_acquire("event:1", Duration::from_millis(10)).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let current = locks.try_acquire("event:1", Duration::from_secs(5)).await.unwrap();
        assert!(current.is_some());
        assert!(!locks.release(&stale).await.unwrap());
        assert!(locks.try_acquire("event:1", Duration::from_secs(5)).await.unwrap().is_none());
    }
}
