//! C7 admission gateway proxy verbs: chat/completion/embedding. Validation
//! is minimal envelope-level only; strict per-model input validation is
//! the backend's job.

use crate::app_state::AppState;
use crate::load_balancer::Candidate;
use crate::repo;
use crate::usage::{compute_cost_micros, UsageRecord};
use axum::body::Body;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::KeyInfo;
use common_http_errors::ApiError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum Verb {
    Chat,
    Completion,
    Embedding,
}

#[derive(Debug, Deserialize)]
struct InferenceEnvelope {
    model: String,
    #[serde(default)]
    messages: Option<Vec<Value>>,
    #[serde(default)]
    prompt: Option<Value>,
    #[serde(default)]
    stream: bool,
}

fn validate_envelope(verb: Verb, env: &InferenceEnvelope) -> Result<(), ApiError> {
    if env.model.trim().is_empty() {
        return Err(ApiError::bad_request("model_required", None));
    }
    match verb {
        Verb::Chat => {
            if env.messages.as_ref().map(|m| m.is_empty()).unwrap_or(true) {
                return Err(ApiError::bad_request("messages_required", None));
            }
        }
        Verb::Completion => {
            if env.prompt.is_none() {
                return Err(ApiError::bad_request("prompt_required", None));
            }
        }
        Verb::Embedding => {}
    }
    Ok(())
}

async fn handle_inference(state: AppState, key_info: KeyInfo, request_id: Uuid, verb: Verb, path: &str, raw_body: Value) -> Result<Response, ApiError> {
    let envelope: InferenceEnvelope =
        serde_json::from_value(raw_body.clone()).map_err(|e| ApiError::Unprocessable { code: "invalid_envelope", trace_id: Some(request_id), message: Some(e.to_string()) })?;
    validate_envelope(verb, &envelope)?;

    let model = repo::find_model(&state.pool, &envelope.model)
        .await
        .map_err(|e| ApiError::internal(e, Some(request_id)))?
        .ok_or_else(|| ApiError::NotFound { code: "model_not_found", trace_id: Some(request_id) })?;

    let candidates: Vec<Candidate> =
        repo::candidate_endpoints(&state.pool, model.id).await.map_err(|e| ApiError::internal(e, Some(request_id)))?;

    let endpoint = state
        .load_balancer
        .select(&candidates)
        .await
        .ok_or(ApiError::ServiceUnavailable { trace_id: Some(request_id), message: Some("no healthy backend for model".into()) })?;

    let started = Instant::now();
    let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
    let upstream = state
        .http_client
        .post(&url)
        .json(&raw_body)
        .timeout(state.config.inference_timeout())
        .send()
        .await;

    let upstream = match upstream {
        Ok(resp) => resp,
        Err(err) => {
            let latency_ms = started.elapsed().as_millis() as f64;
            state.load_balancer.record(&endpoint, latency_ms, true).await;
            state.metrics.record_proxy_error(&endpoint);
            return Err(ApiError::BadGateway { trace_id: Some(request_id) });
        }
    };

    let latency_ms = started.elapsed().as_millis() as f64;
    let is_error = !upstream.status().is_success();
    state.load_balancer.record(&endpoint, latency_ms, is_error).await;
    state.metrics.observe_proxy_latency(latency_ms / 1000.0);
    if is_error {
        state.metrics.record_proxy_error(&endpoint);
    }

    let status = upstream.status();
    let prompt_tokens = upstream.headers().get("x-prompt-tokens").and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
    let completion_tokens =
        upstream.headers().get("x-completion-tokens").and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
    let cached_tokens = upstream.headers().get("x-cached-tokens").and_then(|v| v.to_str().ok()).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);

    if !envelope.stream || status.is_success() {
        state.rate_limiter.record_tokens(key_info.key_id, (prompt_tokens + completion_tokens) as u64).await;
        let cost = compute_cost_micros(prompt_tokens, completion_tokens, model.price_in_micros, model.price_out_micros, 1.0);
        state.usage.record(UsageRecord {
            request_id,
            tenant_id: key_info.tenant_id,
            environment_id: key_info.environment_id,
            key_id: key_info.key_id,
            node_id: None,
            model_id: model.id,
            prompt_tokens,
            completion_tokens,
            cached_tokens,
            latency_ms: latency_ms as i64,
            cost,
        });
    }

    // Streaming responses are passed through end-to-end without buffering.
    let body = Body::from_stream(upstream.bytes_stream());
    let response = Response::builder().status(status).body(body).map_err(|e| ApiError::internal(e, Some(request_id)))?;
    Ok(response)
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(key_info): Extension<KeyInfo>,
    Extension(request_id): Extension<Uuid>,
    Json(body): Json<Value>,
) -> Response {
    handle_inference(state, key_info, request_id, Verb::Chat, "/v1/chat/completions", body).await.into_response()
}

pub async fn completions(
    State(state): State<AppState>,
    Extension(key_info): Extension<KeyInfo>,
    Extension(request_id): Extension<Uuid>,
    Json(body): Json<Value>,
) -> Response {
    handle_inference(state, key_info, request_id, Verb::Completion, "/v1/completions", body).await.into_response()
}

pub async fn embeddings(
    State(state): State<AppState>,
    Extension(key_info): Extension<KeyInfo>,
    Extension(request_id): Extension<Uuid>,
    Json(body): Json<Value>,
) -> Response {
    handle_inference(state, key_info, request_id, Verb::Embedding, "/v1/embeddings", body).await.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_requires_nonempty_messages() {
        let env = InferenceEnvelope { model: "gpt-x".into(), messages: Some(vec![]), prompt: None, stream: false };
        assert!(validate_envelope(Verb::Chat, &env).is_err());
    }

    #[test]
    fn completion_requires_prompt() {
        let env = InferenceEnvelope { model: "gpt-x".into(), messages: None, prompt: None, stream: false };
        assert!(validate_envelope(Verb::Completion, &env).is_err());
    }

    #[test]
    fn embeddings_only_require_a_model() {
        let env = InferenceEnvelope { model: "embed-1".into(), messages: None, prompt: None, stream: false };
        assert!(validate_envelope(Verb::Embedding, &env).is_ok());
    }
}
