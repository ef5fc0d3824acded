//! `GET /v1/models`, `/v1/models/{name}`, `/v1/endpoints*` — read-only
//! catalog and availability surface. Business logic beyond simple SELECTs
//! and the load balancer's candidate count is out of scope.

use crate::app_state::AppState;
use crate::repo;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_http_errors::ApiError;
use serde::Serialize;

#[derive(Serialize)]
struct EndpointAvailability {
    model: String,
    healthy_node_count: usize,
}

pub async fn list_models(State(state): State<AppState>) -> Result<Response, ApiError> {
    let models = repo::list_models(&state.pool).await.map_err(|e| ApiError::internal(e, None))?;
    Ok(Json(models).into_response())
}

pub async fn get_model(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let model = repo::find_model(&state.pool, &name).await.map_err(|e| ApiError::internal(e, None))?;
    match model {
        Some(m) => Ok(Json(m).into_response()),
        None => Err(ApiError::NotFound { code: "model_not_found", trace_id: None }),
    }
}

pub async fn list_endpoints(State(state): State<AppState>) -> Result<Response, ApiError> {
    let models = repo::list_models(&state.pool).await.map_err(|e| ApiError::internal(e, None))?;
    let mut out = Vec::with_capacity(models.len());
    for model in models {
        let candidates = repo::candidate_endpoints(&state.pool, model.id).await.map_err(|e| ApiError::internal(e, None))?;
        out.push(EndpointAvailability { model: model.name, healthy_node_count: candidates.len() });
    }
    Ok(Json(out).into_response())
}

pub async fn get_endpoint(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    let model = repo::find_model(&state.pool, &name).await.map_err(|e| ApiError::internal(e, None))?.ok_or(ApiError::NotFound {
        code: "model_not_found",
        trace_id: None,
    })?;
    let candidates = repo::candidate_endpoints(&state.pool, model.id).await.map_err(|e| ApiError::internal(e, None))?;
    if candidates.is_empty() {
        return Err(ApiError::ServiceUnavailable { trace_id: None, message: Some("no healthy backend".into()) });
    }
    Ok(Json(EndpointAvailability { model: model.name, healthy_node_count: candidates.len() }).into_response())
}
