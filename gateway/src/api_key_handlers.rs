//! `POST|GET|DELETE /v1/api-keys[/{id}]` — self-service API key management,
//! gated to `Pro`/`Enterprise` tenants.

use crate::app_state::AppState;
use crate::repo;
use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::hashing::{generate_api_key, hash_secret};
use common_auth::lookup;
use common_auth::KeyInfo;
use common_http_errors::ApiError;
use common_security::{ensure_capability, Capability, SecurityContext};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn ctx_from_key_info(key_info: &KeyInfo, request_id: Uuid) -> SecurityContext {
    SecurityContext {
        tenant_id: key_info.tenant_id,
        environment_id: key_info.environment_id,
        key_id: key_info.key_id,
        tier: key_info.tier,
        trace_id: Some(request_id),
    }
}

fn require_management_capability(key_info: &KeyInfo, request_id: Uuid) -> Result<(), ApiError> {
    let ctx = ctx_from_key_info(key_info, request_id);
    ensure_capability(&ctx, Capability::ManageCredentials).map_err(|_| ApiError::TierRestricted { required_tier: "pro", trace_id: Some(request_id) })
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    #[serde(default = "default_rpm")]
    pub requests_per_min: u32,
    #[serde(default = "default_tpm")]
    pub tokens_per_min: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

fn default_rpm() -> u32 {
    60
}
fn default_tpm() -> u32 {
    60_000
}
fn default_concurrency() -> u32 {
    10
}

#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub id: Uuid,
    pub key_prefix: String,
    /// Returned exactly once; the caller must persist it themselves.
    pub secret: String,
}

pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(key_info): Extension<KeyInfo>,
    Extension(request_id): Extension<Uuid>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<Response, ApiError> {
    require_management_capability(&key_info, request_id)?;

    let secret = generate_api_key("sk", "live");
    let key_prefix = secret.splitn(3, '_').take(2).collect::<Vec<_>>().join("_");
    let digest = lookup::digest(&secret);
    let secret_hash = hash_secret(&secret).map_err(|e| ApiError::internal(e, Some(request_id)))?;

    let id = repo::insert_api_key(
        &state.pool,
        key_info.environment_id,
        &key_prefix,
        &digest,
        &secret_hash,
        req.requests_per_min as i32,
        req.tokens_per_min as i32,
        req.concurrency as i32,
    )
    .await
    .map_err(|e| ApiError::internal(e, Some(request_id)))?;

    Ok(Json(CreateApiKeyResponse { id, key_prefix, secret }).into_response())
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(key_info): Extension<KeyInfo>,
    Extension(request_id): Extension<Uuid>,
) -> Result<Response, ApiError> {
    require_management_capability(&key_info, request_id)?;
    let keys = repo::list_api_keys(&state.pool, key_info.environment_id).await.map_err(|e| ApiError::internal(e, Some(request_id)))?;
    Ok(Json(keys).into_response())
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(key_info): Extension<KeyInfo>,
    Extension(request_id): Extension<Uuid>,
    Path(key_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_management_capability(&key_info, request_id)?;
    let revoked =
        repo::revoke_api_key(&state.pool, key_id, key_info.environment_id).await.map_err(|e| ApiError::internal(e, Some(request_id)))?;
    if !revoked {
        return Err(ApiError::NotFound { code: "api_key_not_found", trace_id: Some(request_id) });
    }
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}
