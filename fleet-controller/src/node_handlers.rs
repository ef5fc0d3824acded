//! Admin node-lifecycle surface: launch, register, heartbeat, drain,
//! termination-warning, terminate.

use crate::app_state::AppState;
use crate::health_monitor::NodeState;
use crate::health_runner;
use crate::provisioner::LaunchSpec;
use crate::repo;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use common_http_errors::ApiError;
use common_events::DomainEventKind;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub tenant_id: Option<Uuid>,
    pub model_id: Uuid,
    pub instance_type: String,
    pub gpu_type: String,
    pub spot: bool,
    pub region: String,
}

#[derive(Debug, Serialize)]
pub struct LaunchAccepted {
    pub job_id: Uuid,
}

/// `POST /admin/nodes/launch`: records a durable launch job, then asks the
/// provisioner for a cluster. The node row itself is created by
/// `register_node` once the node reports in, not here — a launched cluster
/// may take minutes to boot and call back.
pub async fn launch(State(state): State<AppState>, Json(req): Json<LaunchRequest>) -> Result<Response, ApiError> {
    let job_id = repo::create_launch_job(&state.pool, req.tenant_id, req.model_id).await.map_err(|e| ApiError::internal(e, None))?;

    let spec = LaunchSpec { instance_type: req.instance_type, gpu_type: req.gpu_type, spot: req.spot, region: req.region, model_id: req.model_id };
    match state.provisioner.launch(spec).await {
        Ok(_result) => Ok(Json(LaunchAccepted { job_id }).into_response()),
        Err(err) => {
            let _ = repo::fail_launch_job(&state.pool, job_id, &err.to_string()).await;
            Err(ApiError::BadGateway { trace_id: None })
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub job_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub model_id: Uuid,
    pub cluster_handle: String,
    pub endpoint_url: String,
    pub instance_type: String,
    pub gpu_type: String,
    pub spot: bool,
}

/// `POST /admin/nodes/register`: a booted node (or the provisioner callback
/// on its behalf) reports in with its endpoint. If `job_id` is present, the
/// corresponding launch job is marked completed.
pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> Result<Response, ApiError> {
    let node_id = repo::register_node(
        &state.pool,
        req.tenant_id,
        req.model_id,
        &req.cluster_handle,
        &req.endpoint_url,
        &req.instance_type,
        &req.gpu_type,
        req.spot,
    )
    .await
    .map_err(|e| ApiError::internal(e, None))?;

    if let Some(job_id) = req.job_id {
        let _ = repo::complete_launch_job(&state.pool, job_id, node_id).await;
    }

    let _ = state.events.emit(req.tenant_id, DomainEventKind::NodeLaunched, None, json!({ "node_id": node_id })).await;

    Ok(Json(json!({ "node_id": node_id })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub health_score: f64,
}

/// `POST /admin/nodes/{id}/heartbeat`: the node's own push signal.
pub async fn heartbeat(State(state): State<AppState>, Path(node_id): Path<Uuid>, Json(req): Json<HeartbeatRequest>) -> Result<Response, ApiError> {
    let score = (req.health_score.clamp(0.0, 1.0) * 100.0) as i32;
    let healthy = req.health_score > 0.0;
    repo::record_heartbeat(&state.pool, node_id, score).await.map_err(|e| ApiError::internal(e, None))?;
    state.signals.record_heartbeat(node_id, healthy, Utc::now()).await;
    health_runner::evaluate_node(&state, node_id).await.map_err(|e| ApiError::internal(e, None))?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

/// `POST /admin/nodes/{id}/drain`: operator-driven, terminal with respect
/// to auto re-promotion.
pub async fn drain(State(state): State<AppState>, Path(node_id): Path<Uuid>) -> Result<Response, ApiError> {
    let lock = state.node_locks.lock_for(node_id).await;
    let _guard = lock.lock().await;
    repo::set_node_state(&state.pool, node_id, NodeState::Draining.as_str()).await.map_err(|e| ApiError::internal(e, None))?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

/// `POST /admin/nodes/{id}/termination-warning`: the cloud provider telling
/// us a spot instance is about to be reclaimed. Treated the same as a drain
/// request so C4 stops routing new traffic immediately.
pub async fn termination_warning(State(state): State<AppState>, Path(node_id): Path<Uuid>) -> Result<Response, ApiError> {
    let lock = state.node_locks.lock_for(node_id).await;
    let _guard = lock.lock().await;
    repo::set_node_state(&state.pool, node_id, NodeState::Draining.as_str()).await.map_err(|e| ApiError::internal(e, None))?;
    let _ = state.events.emit(None, DomainEventKind::NodeHealthChanged, None, json!({ "node_id": node_id, "new_state": "draining" })).await;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

/// `POST /admin/nodes/{cluster}/terminate`: tears the cluster down via the
/// provisioner and marks every node on that cluster handle terminated.
pub async fn terminate(State(state): State<AppState>, Path(cluster_handle): Path<String>) -> Result<Response, ApiError> {
    state.provisioner.terminate(&cluster_handle).await.map_err(|e| ApiError::internal(e, None))?;

    let nodes = repo::list_nodes(&state.pool).await.map_err(|e| ApiError::internal(e, None))?;
    for node in nodes.into_iter().filter(|n| n.cluster_handle == cluster_handle) {
        let lock = state.node_locks.lock_for(node.id).await;
        let _guard = lock.lock().await;
        repo::set_node_state(&state.pool, node.id, NodeState::Terminated.as_str()).await.map_err(|e| ApiError::internal(e, None))?;
        let _ = state.events.emit(node.tenant_id, DomainEventKind::NodeTerminated, None, json!({ "node_id": node.id })).await;
    }

    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}

pub async fn get_logs(Path(_node_id): Path<Uuid>) -> Response {
    ApiError::NotImplemented { trace_id: None }.into_response()
}

pub async fn stream_logs(Path(_node_id): Path<Uuid>) -> Response {
    ApiError::NotImplemented { trace_id: None }.into_response()
}
