//! Read paths backing the catalog, endpoint, and usage-reporting routes,
//! plus the self-service API key CRUD. Simple SELECTs/INSERTs; the
//! interesting control-plane logic lives in `load_balancer` and `usage`.

use crate::load_balancer::Candidate;
use chrono::{DateTime, Utc};
use common_money::Money;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ModelRow {
    pub id: Uuid,
    pub name: String,
    pub family: String,
    pub model_type: String,
    pub required_vram_gb: i32,
    pub price_in_micros: i64,
    pub price_out_micros: i64,
    pub status: String,
}

pub async fn find_model(pool: &PgPool, name: &str) -> Result<Option<ModelRow>, sqlx::Error> {
    sqlx::query_as::<_, ModelRow>(
        "SELECT id, name, family, model_type, required_vram_gb, price_in_micros, price_out_micros, status
         FROM models WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn list_models(pool: &PgPool) -> Result<Vec<ModelRow>, sqlx::Error> {
    sqlx::query_as::<_, ModelRow>(
        "SELECT id, name, family, model_type, required_vram_gb, price_in_micros, price_out_micros, status
         FROM models WHERE status <> 'deprecated' ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

/// Candidate endpoints for selection: active nodes bound to the model
/// with a non-empty endpoint URL.
pub async fn candidate_endpoints(pool: &PgPool, model_id: Uuid) -> Result<Vec<Candidate>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT endpoint_url FROM nodes WHERE model_id = $1 AND state = 'active' AND endpoint_url <> ''",
    )
    .bind(model_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(endpoint,)| Candidate { endpoint }).collect())
}

/// All live endpoints (active or draining), used by the staleness sweep to
/// decide which `EndpointStats` entries are still backed by a node.
pub async fn live_endpoints(pool: &PgPool) -> Result<std::collections::HashSet<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT endpoint_url FROM nodes WHERE state IN ('active', 'draining') AND endpoint_url <> ''")
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(e,)| e).collect())
}

/// Active endpoints only, polled for vendor queue-depth metrics.
pub async fn active_endpoint_urls(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT endpoint_url FROM nodes WHERE state = 'active' AND endpoint_url <> ''").fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(e,)| e).collect())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApiKeyRow {
    pub id: Uuid,
    pub key_prefix: String,
    pub environment_id: Uuid,
    pub status: String,
    pub requests_per_min: i32,
    pub tokens_per_min: i32,
    pub concurrency: i32,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

pub async fn list_api_keys(pool: &PgPool, environment_id: Uuid) -> Result<Vec<ApiKeyRow>, sqlx::Error> {
    sqlx::query_as::<_, ApiKeyRow>(
        "SELECT id, key_prefix, environment_id, status, requests_per_min, tokens_per_min, concurrency, created_at, last_used_at
         FROM api_keys WHERE environment_id = $1 ORDER BY created_at DESC",
    )
    .bind(environment_id)
    .fetch_all(pool)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_api_key(
    pool: &PgPool,
    environment_id: Uuid,
    key_prefix: &str,
    lookup_digest: &[u8],
    secret_hash: &str,
    requests_per_min: i32,
    tokens_per_min: i32,
    concurrency: i32,
) -> Result<Uuid, sqlx::Error> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO api_keys (environment_id, key_prefix, lookup_digest, secret_hash, status, requests_per_min, tokens_per_min, concurrency)
         VALUES ($1, $2, $3, $4, 'active', $5, $6, $7)
         RETURNING id",
    )
    .bind(environment_id)
    .bind(key_prefix)
    .bind(lookup_digest)
    .bind(secret_hash)
    .bind(requests_per_min)
    .bind(tokens_per_min)
    .bind(concurrency)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn revoke_api_key(pool: &PgPool, key_id: Uuid, environment_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE api_keys SET status = 'revoked' WHERE id = $1 AND environment_id = $2")
        .bind(key_id)
        .bind(environment_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// C9 per-request insert. Cost is computed by the caller (`usage.rs`) in
/// integer micro-units so no floating-point ever enters storage.
#[allow(clippy::too_many_arguments)]
pub async fn insert_usage_record(
    pool: &PgPool,
    request_id: Uuid,
    tenant_id: Uuid,
    environment_id: Uuid,
    key_id: Uuid,
    node_id: Option<Uuid>,
    model_id: Uuid,
    prompt_tokens: i64,
    completion_tokens: i64,
    cached_tokens: i64,
    latency_ms: i64,
    cost: Money,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO usage_records
            (request_id, tenant_id, environment_id, key_id, node_id, model_id,
             prompt_tokens, completion_tokens, cached_tokens, latency_ms, cost_micros,
             billed, billing_failed, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,false,false,now())",
    )
    .bind(request_id)
    .bind(tenant_id)
    .bind(environment_id)
    .bind(key_id)
    .bind(node_id)
    .bind(model_id)
    .bind(prompt_tokens)
    .bind(completion_tokens)
    .bind(cached_tokens)
    .bind(latency_ms)
    .bind(cost.as_micros())
    .execute(pool)
    .await?;
    Ok(())
}
