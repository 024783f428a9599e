//! Redis lease lock
//! 
//! Leases are plain keys set with `NX PX`, so every worker process sharing
//! the Redis instance sees the same holder. Release is a compare-and-delete
//! script: a worker whose lease already expired cannot delete the key of
//! whoever took it next.

use std::time::Duration;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use tracing::{debug, warn};
use crate::config::RedisConfig;
use crate::services::lock::{LockLease, LockService};
use crate::utils::errors::{SeatwiseError, Result};

const RELEASE_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// Distributed lock backed by Redis
#[derive(Clone)]
pub struct RedisLockService {
    conn: ConnectionManager,
    release_script: redis::Script,
}

impl std::fmt::Debug for RedisLockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockService").finish_non_exhaustive()
    }
}

impl RedisLockService {
    /// Connect to Redis and keep a multiplexed, auto-reconnecting connection
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(SeatwiseError::Redis)?;
        let conn = ConnectionManager::new(client).await
            .map_err(SeatwiseError::Redis)?;

        Ok(Self {
            conn,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        })
    }

    /// Health check for Redis connection
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(response) => {
                debug!(response = %response, "Redis health check successful");
                Ok(response == "PONG")
            }
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl LockService for RedisLockService {
    async fn try_acquire(&self, key: &str, lease: Duration) -> Result<Option<LockLease>> {
        let mut conn = self.conn.clone();
        let granted = LockLease::new(key);
        let lease_ms = u64::try_from(lease.as_millis()).unwrap_or(u64::MAX).max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&granted.token)
            .arg("NX")
            .arg("PX")
            .arg(lease_ms)
            .query_async(&mut conn)
            .await
            .map_err(SeatwiseError::Redis)?;

        Ok(reply.map(|_| granted))
    }

    async fn release(&self, lease: &LockLease) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .release_script
            .key(&lease.key)
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await
            .map_err(SeatwiseError::Redis)?;

        debug!(key = %lease.key, released = deleted > 0, "Redis lease release attempted");
        Ok(deleted > 0)
    }
}
