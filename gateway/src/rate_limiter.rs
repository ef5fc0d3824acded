//! Three-tier sliding-window admission counters plus a per-key concurrency
//! semaphore, backed by a shared KV cache that supports atomic
//! increment-with-optional-expiry (`INCR`/`EXPIRE` on Redis).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

const WINDOW_SECS: i64 = 60;
const BUCKET_TTL_SECS: u64 = 65;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// The KV seam the rate limiter is built on. `incr` is atomic increment
/// that sets a TTL only on the first increment of a key (mirroring Redis
/// `INCR` + conditional `EXPIRE`); `decr` is a plain atomic decrement used
/// by the concurrency semaphore.
#[async_trait]
pub trait RateLimitKv: Send + Sync {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, RateLimitError>;
    async fn incr_by(&self, key: &str, amount: i64, ttl_secs: u64) -> Result<i64, RateLimitError>;
    async fn decr(&self, key: &str) -> Result<i64, RateLimitError>;
}

#[derive(Clone)]
pub struct RedisRateLimitKv {
    manager: ConnectionManager,
}

impl RedisRateLimitKv {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl RateLimitKv for RedisRateLimitKv {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, RateLimitError> {
        let mut conn = self.manager.clone();
        let current: i64 = conn.incr(key, 1).await.map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        if current == 1 {
            let _: () = conn.expire(key, ttl_secs as i64).await.map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        }
        Ok(current)
    }

    async fn incr_by(&self, key: &str, amount: i64, ttl_secs: u64) -> Result<i64, RateLimitError> {
        let mut conn = self.manager.clone();
        let current: i64 = conn.incr(key, amount).await.map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        if current == amount {
            let _: () = conn.expire(key, ttl_secs as i64).await.map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        }
        Ok(current)
    }

    async fn decr(&self, key: &str) -> Result<i64, RateLimitError> {
        let mut conn = self.manager.clone();
        conn.decr(key, 1).await.map_err(|e| RateLimitError::Unavailable(e.to_string()))
    }
}

/// In-memory KV fake used by unit tests; not shared across processes.
#[derive(Clone, Default)]
pub struct InMemoryRateLimitKv {
    inner: Arc<Mutex<HashMap<String, (i64, DateTime<Utc>, u64)>>>,
}

impl InMemoryRateLimitKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitKv for InMemoryRateLimitKv {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, RateLimitError> {
        self.incr_by(key, 1, ttl_secs).await
    }

    async fn incr_by(&self, key: &str, amount: i64, ttl_secs: u64) -> Result<i64, RateLimitError> {
        let mut guard = self.inner.lock().await;
        let now = Utc::now();
        let entry = guard.entry(key.to_string()).or_insert((0, now, ttl_secs));
        if now.signed_duration_since(entry.1).num_seconds() >= entry.2 as i64 {
            *entry = (0, now, ttl_secs);
        }
        entry.0 += amount;
        Ok(entry.0)
    }

    async fn decr(&self, key: &str) -> Result<i64, RateLimitError> {
        let mut guard = self.inner.lock().await;
        let entry = guard.entry(key.to_string()).or_insert((0, Utc::now(), 0));
        entry.0 -= 1;
        Ok(entry.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub requests_per_min: u32,
    pub tokens_per_min: u32,
    pub concurrency: u32,
    pub environment_rpm: u32,
    pub tenant_rpm: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_unix: i64,
}

#[derive(Debug, Clone, Copy)]
pub enum AdmitDecision {
    Allowed(RateLimitInfo),
    Rejected { info: RateLimitInfo, retry_after_secs: u64 },
}

fn current_bucket() -> (i64, i64) {
    let now = Utc::now().timestamp();
    let bucket_start = now - now.rem_euclid(WINDOW_SECS);
    (bucket_start / WINDOW_SECS, bucket_start + WINDOW_SECS)
}

#[derive(Clone)]
pub struct RateLimiter {
    kv: Arc<dyn RateLimitKv>,
    prefix: String,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn RateLimitKv>, prefix: String) -> Self {
        Self { kv, prefix }
    }

    /// C2 `Admit`: increments the apiKey/environment/tenant sliding-window
    /// counters for the current minute bucket. The counters are never rolled
    /// back on rejection — a key that bursts past its ceiling must keep
    /// failing fast for the rest of the bucket.
    pub async fn admit(
        &self,
        key_id: Uuid,
        environment_id: Uuid,
        tenant_id: Uuid,
        limits: RateLimits,
    ) -> Result<AdmitDecision, RateLimitError> {
        let (bucket, reset_at) = current_bucket();

        let key_count = self.incr_scope("key", key_id, bucket).await?;
        let env_count = self.incr_scope("env", environment_id, bucket).await?;
        let tenant_count = self.incr_scope("tenant", tenant_id, bucket).await?;

        let key_limit = if limits.requests_per_min == 0 { 60 } else { limits.requests_per_min };
        let env_limit = if limits.environment_rpm == 0 { 10_000 } else { limits.environment_rpm };
        let tenant_limit = if limits.tenant_rpm == 0 { 50_000 } else { limits.tenant_rpm };

        let info = RateLimitInfo {
            limit: key_limit,
            remaining: key_limit.saturating_sub(key_count.max(0) as u32),
            reset_at_unix: reset_at,
        };

        let over_limit = key_count > key_limit as i64 || env_count > env_limit as i64 || tenant_count > tenant_limit as i64;
        if over_limit {
            let retry_after = (reset_at - Utc::now().timestamp()).max(1) as u64;
            return Ok(AdmitDecision::Rejected { info, retry_after_secs: retry_after });
        }

        Ok(AdmitDecision::Allowed(info))
    }

    async fn incr_scope(&self, scope: &str, id: Uuid, bucket: i64) -> Result<i64, RateLimitError> {
        let key = format!("{}:{}:{}:{}", self.prefix, scope, id, bucket);
        self.kv.incr(&key, BUCKET_TTL_SECS).await
    }

    /// Fire-and-forget token metering, used for quota visibility only.
    pub async fn record_tokens(&self, key_id: Uuid, tokens: u64) {
        if tokens == 0 {
            return;
        }
        let (bucket, _) = current_bucket();
        let key = format!("{}:tokens:key:{}:minute:{}", self.prefix, key_id, bucket);
        let _ = self.kv.incr_by(&key, tokens as i64, BUCKET_TTL_SECS).await;
    }

    /// C2 `Acquire`: atomically increments the concurrency counter; rolls
    /// back immediately if it would exceed the key's limit.
    pub async fn acquire(&self, key_id: Uuid, concurrency_limit: u32) -> Result<bool, RateLimitError> {
        let limit = if concurrency_limit == 0 { 10 } else { concurrency_limit };
        let key = format!("{}:conc:{}", self.prefix, key_id);
        let current = self.kv.incr(&key, 3600).await?;
        if current > limit as i64 {
            self.kv.decr(&key).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// C2 `Release`: must be invoked once per admitted request on every exit
    /// path (success, error, panic, client disconnect).
    pub async fn release(&self, key_id: Uuid) {
        let key = format!("{}:conc:{}", self.prefix, key_id);
        if let Err(err) = self.kv.decr(&key).await {
            tracing::warn!(?err, %key_id, "failed to release concurrency slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RateLimits {
        RateLimits { requests_per_min: 3, tokens_per_min: 1000, concurrency: 2, environment_rpm: 10_000, tenant_rpm: 50_000 }
    }

    #[tokio::test]
    async fn admits_up_to_the_configured_ceiling_then_rejects() {
        let rl = RateLimiter::new(Arc::new(InMemoryRateLimitKv::new()), "test".to_string());
        let key_id = Uuid::new_v4();
        let env_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        for _ in 0..3 {
            let decision = rl.admit(key_id, env_id, tenant_id, limits()).await.unwrap();
            assert!(matches!(decision, AdmitDecision::Allowed(_)));
        }

        let fourth = rl.admit(key_id, env_id, tenant_id, limits()).await.unwrap();
        match fourth {
            AdmitDecision::Rejected { retry_after_secs, .. } => assert!(retry_after_secs >= 1 && retry_after_secs <= 60),
            _ => panic!("expected rejection on 4th request"),
        }
    }

    #[tokio::test]
    async fn record_tokens_adds_the_full_token_count_not_one_per_call() {
        let kv = Arc::new(InMemoryRateLimitKv::new());
        let rl = RateLimiter::new(kv.clone(), "test".to_string());
        let key_id = Uuid::new_v4();

        rl.record_tokens(key_id, 250).await;
        rl.record_tokens(key_id, 10).await;

        let (bucket, _) = current_bucket();
        let key = format!("test:tokens:key:{}:minute:{}", key_id, bucket);
        let total = kv.incr_by(&key, 0, BUCKET_TTL_SECS).await.unwrap();
        assert_eq!(total, 260);
    }

    #[tokio::test]
    async fn concurrency_semaphore_rolls_back_on_overflow() {
        let rl = RateLimiter::new(Arc::new(InMemoryRateLimitKv::new()), "test".to_string());
        let key_id = Uuid::new_v4();

        assert!(rl.acquire(key_id, 1).await.unwrap());
        assert!(!rl.acquire(key_id, 1).await.unwrap());

        rl.release(key_id).await;
        assert!(rl.acquire(key_id, 1).await.unwrap());
    }
}
