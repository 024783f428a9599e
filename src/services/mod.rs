//! Services module
//!
//! This module contains the admission core: lock services, the per-event
//! gate, ledger storage and the admission engine itself

pub mod admission;
pub mod gate;
pub mod ledger;
pub mod lock;
pub mod redis;

// Re-export commonly used services
pub use admission::{AdmissionEngine, PositionChange, plan_renumbering};
pub use gate::{EventGate, LockPolicy};
pub use ledger::{LedgerStore, LedgerTransaction, PgLedgerStore, InMemoryLedgerStore, FailPoint};
pub use lock::{LockService, LockLease, LocalLockService, SharedLockService};
pub use self::redis::RedisLockService;

use std::sync::Arc;
use tracing::info;
use crate::config::{LockBackend, Settings};
use crate::database::{DatabasePool, DatabaseService};
use crate::utils::errors::Result;

/// Engine wired for production: Postgres ledger, lock backend from settings
pub type ProductionEngine = AdmissionEngine<PgLedgerStore, SharedLockService>;

/// Service factory for creating and managing all services
#[derive(Clone)]
pub struct ServiceFactory {
    pub database: DatabaseService,
    pub engine: Arc<ProductionEngine>,
    pool: DatabasePool,
    redis_locks: Option<RedisLockService>,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub async fn new(settings: &Settings, pool: DatabasePool) -> Result<Self> {
        let (locks, redis_locks): (SharedLockService, Option<RedisLockService>) = match settings.lock.backend {
            LockBackend::Redis => {
                let redis_locks = RedisLockService::connect(&settings.redis).await?;
                info!("Admission gate backed by Redis leases");
                (Arc::new(redis_locks.clone()), Some(redis_locks))
            }
            LockBackend::Local => {
                info!("Admission gate backed by in-process locks");
                (Arc::new(LocalLockService::new()), None)
            }
        };

        let gate = EventGate::new(locks, settings.redis.prefix.clone(), LockPolicy::from(&settings.lock));
        let engine = AdmissionEngine::new(PgLedgerStore::new(pool.clone()), gate);

        Ok(Self {
            database: DatabaseService::new(pool.clone(), settings.admission.clone()),
            engine: Arc::new(engine),
            pool,
            redis_locks,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let database_healthy = crate::database::health_check(&self.pool).await.is_ok();
        let redis_healthy = match &self.redis_locks {
            Some(locks) => Some(locks.health_check().await.unwrap_or(false)),
            None => None,
        };

        ServiceHealthStatus {
            database_healthy,
            redis_healthy,
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub database_healthy: bool,
    /// `None` when the lock backend does not use Redis
    pub redis_healthy: Option<bool>,
}

impl ServiceHealthStatus {
    /// Check if all critical services are healthy
    pub fn is_healthy(&self) -> bool {
        self.database_healthy && self.redis_healthy.unwrap_or(true)
    }

    /// Get list of unhealthy services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.database_healthy {
            issues.push("Database connection failed".to_string());
        }
        if self.redis_healthy == Some(false) {
            issues.push("Redis connection failed".to_string());
        }

        issues
    }
}
