//! Admin CRUD for models/regions/instance-types/tenants/credentials/
//! deployments/routes. Routed so the admin surface is complete, not so it
//! does anything beyond the honest minimum: reads are real SELECTs, writes
//! return 501 rather than pretending to succeed.

use crate::app_state::AppState;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_http_errors::ApiError;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, FromRow)]
struct TenantRow {
    id: Uuid,
    display_name: String,
    status: String,
    billing_plan: String,
}

pub async fn list_tenants(State(state): State<AppState>) -> Result<Response, ApiError> {
    let rows: Vec<TenantRow> = sqlx::query_as("SELECT id, display_name, status, billing_plan FROM tenants ORDER BY display_name")
        .fetch_all(&state.pool)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    Ok(Json(rows).into_response())
}

pub async fn get_tenant(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> Result<Response, ApiError> {
    let row: Option<TenantRow> = sqlx::query_as("SELECT id, display_name, status, billing_plan FROM tenants WHERE id = $1")
        .bind(tenant_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| ApiError::internal(e, None))?;
    match row {
        Some(t) => Ok(Json(t).into_response()),
        None => Err(ApiError::NotFound { code: "tenant_not_found", trace_id: None }),
    }
}

/// Every other admin CRUD verb (regions, instance types, credentials,
/// deployments, routes, and tenant/model mutations) lands here.
pub async fn not_implemented() -> Response {
    ApiError::NotImplemented { trace_id: None }.into_response()
}
