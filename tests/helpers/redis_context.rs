//! Redis test instance
//!
//! Uses `TEST_REDIS_URL` when it is set, otherwise starts a throwaway Redis
//! container that lives as long as the returned value.

use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::{Redis, REDIS_PORT};
use uuid::Uuid;
use seatwise::config::RedisConfig;
use seatwise::services::RedisLockService;

pub struct TestRedis {
    pub config: RedisConfig,
    _container: Option<ContainerAsync<Redis>>,
}

impl TestRedis {
    pub async fn start() -> Self {
        // Key prefix per instance so runs against a shared server never collide
        let prefix = format!("seatwise-test:{}:", &Uuid::new_v4().simple().to_string()[..8]);

        if let Ok(url) = std::env::var("TEST_REDIS_URL") {
            return Self {
                config: RedisConfig { url, prefix },
                _container: None,
            };
        }

        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start redis container");
        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get redis port");

        Self {
            config: RedisConfig {
                url: format!("redis://127.0.0.1:{}", port),
                prefix,
            },
            _container: Some(container),
        }
    }

    pub async fn lock_service(&self) -> RedisLockService {
        RedisLockService::connect(&self.config)
            .await
            .expect("Failed to connect to test Redis")
    }
}
