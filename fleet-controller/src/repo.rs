//! Postgres access for nodes and launch jobs. `launch_jobs` lives in the DB
//! rather than a process-local map, since no business rule depends on
//! in-memory launch tracking and a multi-instance deployment needs it
//! durable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NodeRow {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub model_id: Uuid,
    pub cluster_handle: String,
    pub endpoint_url: String,
    pub instance_type: String,
    pub gpu_type: String,
    pub spot: bool,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub health_score: i32,
    pub state: String,
}

pub async fn get_node(pool: &PgPool, node_id: Uuid) -> Result<Option<NodeRow>, sqlx::Error> {
    sqlx::query_as::<_, NodeRow>(
        "SELECT id, tenant_id, model_id, cluster_handle, endpoint_url, instance_type, gpu_type, spot, last_heartbeat_at, health_score, state
         FROM nodes WHERE id = $1",
    )
    .bind(node_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_nodes(pool: &PgPool) -> Result<Vec<NodeRow>, sqlx::Error> {
    sqlx::query_as::<_, NodeRow>(
        "SELECT id, tenant_id, model_id, cluster_handle, endpoint_url, instance_type, gpu_type, spot, last_heartbeat_at, health_score, state
         FROM nodes WHERE state <> 'terminated' ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_active_nodes(pool: &PgPool) -> Result<Vec<NodeRow>, sqlx::Error> {
    sqlx::query_as::<_, NodeRow>(
        "SELECT id, tenant_id, model_id, cluster_handle, endpoint_url, instance_type, gpu_type, spot, last_heartbeat_at, health_score, state
         FROM nodes WHERE state IN ('active', 'suspect', 'degraded')",
    )
    .fetch_all(pool)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn register_node(
    pool: &PgPool,
    tenant_id: Option<Uuid>,
    model_id: Uuid,
    cluster_handle: &str,
    endpoint_url: &str,
    instance_type: &str,
    gpu_type: &str,
    spot: bool,
) -> Result<Uuid, sqlx::Error> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO nodes (tenant_id, model_id, cluster_handle, endpoint_url, instance_type, gpu_type, spot, health_score, state)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 'initializing')
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(model_id)
    .bind(cluster_handle)
    .bind(endpoint_url)
    .bind(instance_type)
    .bind(gpu_type)
    .bind(spot)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn record_heartbeat(pool: &PgPool, node_id: Uuid, health_score: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE nodes SET last_heartbeat_at = now(), health_score = $2 WHERE id = $1")
        .bind(node_id)
        .bind(health_score)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_node_state(pool: &PgPool, node_id: Uuid, state: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE nodes SET state = $2 WHERE id = $1").bind(node_id).bind(state).execute(pool).await?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LaunchJobRow {
    pub job_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub model_id: Uuid,
    pub status: String,
    pub node_id: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn create_launch_job(pool: &PgPool, tenant_id: Option<Uuid>, model_id: Uuid) -> Result<Uuid, sqlx::Error> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO launch_jobs (tenant_id, model_id, status, created_at) VALUES ($1, $2, 'pending', now()) RETURNING job_id",
    )
    .bind(tenant_id)
    .bind(model_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn complete_launch_job(pool: &PgPool, job_id: Uuid, node_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE launch_jobs SET status = 'completed', node_id = $2 WHERE job_id = $1")
        .bind(job_id)
        .bind(node_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fail_launch_job(pool: &PgPool, job_id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE launch_jobs SET status = 'failed', error = $2 WHERE job_id = $1").bind(job_id).bind(error).execute(pool).await?;
    Ok(())
}

pub async fn get_launch_job(pool: &PgPool, job_id: Uuid) -> Result<Option<LaunchJobRow>, sqlx::Error> {
    sqlx::query_as::<_, LaunchJobRow>(
        "SELECT job_id, tenant_id, model_id, status, node_id, error, created_at FROM launch_jobs WHERE job_id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
}
