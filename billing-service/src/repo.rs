//! Postgres access for the webhook audit log, billing events, tenants, and
//! the usage/rollup tables C9 maintains.

use chrono::{DateTime, Utc};
use common_money::Money;
use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// Inserts the webhook audit row, tolerating a replay (`ON CONFLICT DO
/// NOTHING`) so a duplicate delivery never produces a second row.
pub async fn insert_webhook_event(pool: &PgPool, external_event_id: &str, event_type: &str, payload: &serde_json::Value) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO webhook_events (external_event_id, event_type, payload, received_at)
         VALUES ($1, $2, $3, now())
         ON CONFLICT (external_event_id) DO NOTHING",
    )
    .bind(external_event_id)
    .bind(event_type)
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(())
}

/// Generic over `PgExecutor` so callers can run this standalone against the
/// pool or as part of a caller-owned transaction (`&mut *tx`).
pub async fn set_tenant_status<'c, E: PgExecutor<'c>>(executor: E, tenant_id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET status = $2, updated_at = now() WHERE id = $1").bind(tenant_id).bind(status).execute(executor).await?;
    Ok(())
}

pub async fn set_tenant_status_and_plan<'c, E: PgExecutor<'c>>(executor: E, tenant_id: Uuid, status: &str, billing_plan: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET status = $2, billing_plan = $3, updated_at = now() WHERE id = $1")
        .bind(tenant_id)
        .bind(status)
        .bind(billing_plan)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn find_tenant_by_billing_customer_id<'c, E: PgExecutor<'c>>(executor: E, billing_customer_id: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tenants WHERE billing_customer_id = $1").bind(billing_customer_id).fetch_optional(executor).await?;
    Ok(row.map(|r| r.0))
}

pub async fn mark_usage_records_billed_for_tenant<'c, E: PgExecutor<'c>>(executor: E, tenant_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE usage_records SET billed = true WHERE tenant_id = $1 AND billed = false").bind(tenant_id).execute(executor).await?;
    Ok(result.rows_affected())
}

pub async fn insert_billing_event<'c, E: PgExecutor<'c>>(executor: E, tenant_id: Uuid, kind: &str, amount: Money, external_reference: Option<&str>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO billing_events (tenant_id, kind, amount_micros, external_reference, created_at)
         VALUES ($1, $2, $3, $4, now())",
    )
    .bind(tenant_id)
    .bind(kind)
    .bind(amount.as_micros())
    .bind(external_reference)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
pub struct HourlyRollupRow {
    pub tenant_id: Uuid,
    pub environment_id: Uuid,
    pub model_id: Uuid,
    pub region: String,
    pub total_prompt_tokens: i64,
    pub total_completion_tokens: i64,
    pub total_requests: i64,
    pub total_cost_micros: i64,
    pub avg_latency_ms: i64,
}

/// Sums/averages `usage_records` over the previous closed hour, grouped by
/// `(tenant, env, model, region)`.
pub async fn rollup_previous_hour(pool: &PgPool) -> Result<Vec<HourlyRollupRow>, sqlx::Error> {
    sqlx::query_as::<_, HourlyRollupRow>(
        "SELECT u.tenant_id, u.environment_id, u.model_id, n.cluster_handle AS region,
                SUM(u.prompt_tokens) AS total_prompt_tokens,
                SUM(u.completion_tokens) AS total_completion_tokens,
                COUNT(*) AS total_requests,
                SUM(u.cost_micros) AS total_cost_micros,
                COALESCE(AVG(u.latency_ms), 0)::BIGINT AS avg_latency_ms
         FROM usage_records u
         LEFT JOIN nodes n ON n.id = u.node_id
         WHERE u.created_at >= date_trunc('hour', now()) - interval '1 hour'
           AND u.created_at < date_trunc('hour', now())
         GROUP BY u.tenant_id, u.environment_id, u.model_id, n.cluster_handle",
    )
    .fetch_all(pool)
    .await
}

pub async fn upsert_usage_hourly(pool: &PgPool, hour: DateTime<Utc>, row: &HourlyRollupRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO usage_hourly
            (hour, tenant_id, environment_id, model_id, region, total_prompt_tokens,
             total_completion_tokens, total_requests, total_cost_micros, avg_latency_ms)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
         ON CONFLICT (hour, tenant_id, environment_id, model_id, region)
         DO UPDATE SET
            total_prompt_tokens = usage_hourly.total_prompt_tokens + EXCLUDED.total_prompt_tokens,
            total_completion_tokens = usage_hourly.total_completion_tokens + EXCLUDED.total_completion_tokens,
            total_requests = usage_hourly.total_requests + EXCLUDED.total_requests,
            total_cost_micros = usage_hourly.total_cost_micros + EXCLUDED.total_cost_micros,
            avg_latency_ms = (usage_hourly.avg_latency_ms + EXCLUDED.avg_latency_ms) / 2",
    )
    .bind(hour)
    .bind(row.tenant_id)
    .bind(row.environment_id)
    .bind(row.model_id)
    .bind(&row.region)
    .bind(row.total_prompt_tokens)
    .bind(row.total_completion_tokens)
    .bind(row.total_requests)
    .bind(row.total_cost_micros)
    .bind(row.avg_latency_ms)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UnbilledTenantTotal {
    pub tenant_id: Uuid,
    pub total_cost_micros: i64,
    pub billing_customer_id: Option<String>,
}

/// Groups unbilled usage records from the last hour by tenant, for the
/// billing export. Only tenants with an external billing customer id are
/// eligible.
pub async fn unbilled_totals_last_hour(pool: &PgPool) -> Result<Vec<UnbilledTenantTotal>, sqlx::Error> {
    sqlx::query_as::<_, UnbilledTenantTotal>(
        "SELECT u.tenant_id, SUM(u.cost_micros) AS total_cost_micros, t.billing_customer_id
         FROM usage_records u
         JOIN tenants t ON t.id = u.tenant_id
         WHERE u.billed = false AND u.billing_failed = false
           AND u.created_at >= now() - interval '1 hour'
         GROUP BY u.tenant_id, t.billing_customer_id
         HAVING t.billing_customer_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await
}

pub async fn mark_usage_billing_failed(pool: &PgPool, tenant_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE usage_records SET billing_failed = true, retry_count = retry_count + 1
         WHERE tenant_id = $1 AND billed = false AND created_at >= now() - interval '1 hour'",
    )
    .bind(tenant_id)
    .execute(pool)
    .await?;
    Ok(())
}
