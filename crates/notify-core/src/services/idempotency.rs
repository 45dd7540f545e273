/// Idempotency store (C4)
use crate::error::ProcessingError;
use crate::utils::retry::{retry_with_backoff, RetryConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, ProcessingError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProcessingError>;
}

/// Redis-backed idempotency store. Issues a plain `EXISTS` followed by a
/// `SET ... EX <ttl>` — the sequential check-then-set pattern this system
/// mandates, not an atomic `SETNX`.
pub struct RedisIdempotencyStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisIdempotencyStore {
    pub async fn connect(redis_url: &str) -> Result<Self, ProcessingError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| ProcessingError::Config(format!("invalid REDIS_URL: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| ProcessingError::Transient(format!("failed to connect to redis: {e}")))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn exists(&self, key: &str) -> Result<bool, ProcessingError> {
        retry_with_backoff(
            || {
                let mut conn = self.manager.clone();
                async move {
                    redis::cmd("EXISTS")
                        .arg(key)
                        .query_async::<i64>(&mut conn)
                        .await
                        .map(|count| count > 0)
                        .map_err(|e| ProcessingError::Transient(format!("redis EXISTS failed: {e}")))
                }
            },
            RetryConfig::default(),
            "redis_exists",
        )
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ProcessingError> {
        retry_with_backoff(
            || {
                let mut conn = self.manager.clone();
                async move {
                    redis::cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("EX")
                        .arg(ttl.as_secs())
                        .query_async::<()>(&mut conn)
                        .await
                        .map_err(|e| ProcessingError::Transient(format!("redis SET failed: {e}")))
                }
            },
            RetryConfig::default(),
            "redis_set",
        )
        .await?;

        debug!(key = key, ttl_seconds = ttl.as_secs(), "recorded idempotency key");
        Ok(())
    }
}

/// In-memory idempotency store for tests.
pub struct InMemoryIdempotencyStore {
    store: tokio::sync::Mutex<std::collections::HashMap<String, std::time::Instant>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self {
            store: tokio::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn exists(&self, key: &str) -> Result<bool, ProcessingError> {
        let store = self.store.lock().await;
        let now = std::time::Instant::now();
        Ok(store.get(key).filter(|&&exp| exp > now).is_some())
    }

    async fn set(&self, key: &str, _value: &str, ttl: Duration) -> Result<(), ProcessingError> {
        let mut store = self.store.lock().await;
        store.insert(key.to_string(), std::time::Instant::now() + ttl);
        Ok(())
    }
}
