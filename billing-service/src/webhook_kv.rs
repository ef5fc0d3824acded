//! Reservation KV for idempotent webhook processing. Backed by the same
//! `redis::aio::ConnectionManager` seam the gateway's rate limiter uses,
//! generalized here to a `SET NX` + plain `GET`/`DEL` since a reservation
//! is a single key rather than a counter.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum WebhookKvError {
    #[error("webhook reservation store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait WebhookKv: Send + Sync {
    /// Atomic set-if-absent. Returns `true` if this call won the reservation.
    async fn try_reserve(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, WebhookKvError>;
    async fn get(&self, key: &str) -> Result<Option<String>, WebhookKvError>;
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), WebhookKvError>;
    async fn delete(&self, key: &str) -> Result<(), WebhookKvError>;
}

#[derive(Clone)]
pub struct RedisWebhookKv {
    manager: ConnectionManager,
}

impl RedisWebhookKv {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl WebhookKv for RedisWebhookKv {
    async fn try_reserve(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, WebhookKvError> {
        let mut conn = self.manager.clone();
        let opts = redis::SetOptions::default().conditional_set(redis::ExistenceCheck::NX).with_expiration(redis::SetExpiry::EX(ttl_secs as usize));
        let result: Option<String> = conn.set_options(key, value, opts).await.map_err(|e| WebhookKvError::Unavailable(e.to_string()))?;
        Ok(result.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, WebhookKvError> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(|e| WebhookKvError::Unavailable(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), WebhookKvError> {
        let mut conn = self.manager.clone();
        conn.set_ex(key, value, ttl_secs).await.map_err(|e| WebhookKvError::Unavailable(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), WebhookKvError> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(key).await.map_err(|e| WebhookKvError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// In-memory fake used by tests. TTLs are not enforced (tests run well
/// within any reasonable processing/processed window).
#[derive(Clone, Default)]
pub struct InMemoryWebhookKv {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryWebhookKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookKv for InMemoryWebhookKv {
    async fn try_reserve(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<bool, WebhookKvError> {
        let mut guard = self.inner.lock().await;
        if guard.contains_key(key) {
            return Ok(false);
        }
        guard.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, WebhookKvError> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_secs: u64) -> Result<(), WebhookKvError> {
        self.inner.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), WebhookKvError> {
        self.inner.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_reservation_of_the_same_key_loses() {
        let kv = InMemoryWebhookKv::new();
        assert!(kv.try_reserve("evt_1", "processing", 300).await.unwrap());
        assert!(!kv.try_reserve("evt_1", "processing", 300).await.unwrap());
    }

    #[tokio::test]
    async fn finalize_then_delete_round_trips() {
        let kv = InMemoryWebhookKv::new();
        kv.try_reserve("evt_1", "processing", 300).await.unwrap();
        kv.set("evt_1", "processed", 86_400).await.unwrap();
        assert_eq!(kv.get("evt_1").await.unwrap().as_deref(), Some("processed"));
        kv.delete("evt_1").await.unwrap();
        assert_eq!(kv.get("evt_1").await.unwrap(), None);
    }
}
