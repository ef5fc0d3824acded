//! Postgres-backed `common_auth::KeyStore`: resolves the lookup digest to
//! a row joining `api_keys`, `environments`, and `tenants` in one query.

use async_trait::async_trait;
use common_auth::{EnvironmentStatus, KeyInfo, KeyStatus, KeyStore, StoreError, StoredKey, TenantStatus, Tier};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgKeyStore {
    pool: PgPool,
}

impl PgKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_key_status(s: &str) -> KeyStatus {
    match s {
        "active" => KeyStatus::Active,
        "suspended" => KeyStatus::Suspended,
        _ => KeyStatus::Revoked,
    }
}

fn parse_tenant_status(s: &str) -> TenantStatus {
    match s {
        "active" => TenantStatus::Active,
        "suspended" => TenantStatus::Suspended,
        "canceled" => TenantStatus::Canceled,
        _ => TenantStatus::Deleted,
    }
}

fn parse_environment_status(s: &str) -> EnvironmentStatus {
    match s {
        "active" => EnvironmentStatus::Active,
        _ => EnvironmentStatus::Disabled,
    }
}

fn parse_tier(s: &str) -> Tier {
    s.parse().unwrap_or(Tier::Free)
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn find_by_lookup_digest(&self, digest: &[u8]) -> Result<Option<StoredKey>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                k.id AS key_id,
                k.key_prefix,
                k.secret_hash,
                k.status AS key_status,
                k.expires_at,
                k.requests_per_min,
                k.tokens_per_min,
                k.concurrency,
                e.id AS environment_id,
                e.status AS environment_status,
                t.id AS tenant_id,
                t.status AS tenant_status,
                t.billing_plan
            FROM api_keys k
            JOIN environments e ON e.id = k.environment_id
            JOIN tenants t ON t.id = e.tenant_id
            WHERE k.lookup_digest = $1
            "#,
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(StoredKey {
            info: KeyInfo {
                key_id: row.try_get::<Uuid, _>("key_id").map_err(|e| StoreError::Unavailable(e.to_string()))?,
                key_prefix: row.try_get("key_prefix").map_err(|e| StoreError::Unavailable(e.to_string()))?,
                tenant_id: row.try_get("tenant_id").map_err(|e| StoreError::Unavailable(e.to_string()))?,
                environment_id: row.try_get("environment_id").map_err(|e| StoreError::Unavailable(e.to_string()))?,
                tier: parse_tier(&row.try_get::<String, _>("billing_plan").map_err(|e| StoreError::Unavailable(e.to_string()))?),
                requests_per_min: row.try_get::<i32, _>("requests_per_min").map_err(|e| StoreError::Unavailable(e.to_string()))? as u32,
                tokens_per_min: row.try_get::<i32, _>("tokens_per_min").map_err(|e| StoreError::Unavailable(e.to_string()))? as u32,
                concurrency: row.try_get::<i32, _>("concurrency").map_err(|e| StoreError::Unavailable(e.to_string()))? as u32,
            },
            secret_hash: row.try_get("secret_hash").map_err(|e| StoreError::Unavailable(e.to_string()))?,
            status: parse_key_status(&row.try_get::<String, _>("key_status").map_err(|e| StoreError::Unavailable(e.to_string()))?),
            expires_at: row.try_get("expires_at").map_err(|e| StoreError::Unavailable(e.to_string()))?,
            tenant_status: parse_tenant_status(&row.try_get::<String, _>("tenant_status").map_err(|e| StoreError::Unavailable(e.to_string()))?),
            environment_status: parse_environment_status(
                &row.try_get::<String, _>("environment_status").map_err(|e| StoreError::Unavailable(e.to_string()))?,
            ),
        }))
    }

    async fn touch_last_used(&self, key_id: Uuid) {
        let _ = sqlx::query("UPDATE api_keys SET last_used_at = now() WHERE id = $1").bind(key_id).execute(&self.pool).await;
    }
}
