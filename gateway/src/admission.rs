//! C7 Admission Gateway pipeline: authenticate, admit, attach rate-limit
//! headers, defer release on all exit paths.
//! Selection and proxying happen in `inference_handlers`, which reuses the
//! `KeyInfo` this middleware attaches to request extensions.

use crate::app_state::AppState;
use crate::rate_limiter::{AdmitDecision, RateLimits};
use crate::release_guard::ReleaseGuardedBody;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_auth::KeyInfo;
use common_http_errors::ApiError;
use uuid::Uuid;

pub async fn admission_middleware(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();

    let secret = match bearer_secret(&req) {
        Some(s) => s,
        None => {
            state.metrics.record_admission("missing_credential");
            return ApiError::Unauthorized { code: "missing_credential", trace_id: Some(request_id) }.into_response();
        }
    };

    let key_info = match state.authenticator.validate(&secret).await {
        Ok(info) => info,
        Err(err) => {
            state.metrics.record_admission("auth_rejected");
            return err.into_response();
        }
    };

    let limits = RateLimits {
        requests_per_min: key_info.requests_per_min,
        tokens_per_min: key_info.tokens_per_min,
        concurrency: key_info.concurrency,
        environment_rpm: state.config.environment_rpm,
        tenant_rpm: state.config.tenant_rpm,
    };

    let decision = match state.rate_limiter.admit(key_info.key_id, key_info.environment_id, key_info.tenant_id, limits).await {
        Ok(d) => d,
        Err(err) => {
            state.metrics.record_admission("rate_limit_store_unavailable");
            return ApiError::ServiceUnavailable { trace_id: Some(request_id), message: Some(err.to_string()) }.into_response();
        }
    };

    let info = match decision {
        AdmitDecision::Allowed(info) => info,
        AdmitDecision::Rejected { info, retry_after_secs } => {
            state.metrics.record_admission("rate_limited");
            state.metrics.record_rate_limit_rejection("key");
            let mut resp = ApiError::RateLimited { retry_after_secs, trace_id: Some(request_id) }.into_response();
            apply_rate_limit_headers(&mut resp, &info, request_id);
            return resp;
        }
    };

    let acquired = match state.rate_limiter.acquire(key_info.key_id, key_info.concurrency).await {
        Ok(a) => a,
        Err(err) => {
            state.metrics.record_admission("rate_limit_store_unavailable");
            return ApiError::ServiceUnavailable { trace_id: Some(request_id), message: Some(err.to_string()) }.into_response();
        }
    };

    if !acquired {
        state.metrics.record_admission("concurrency_rejected");
        let mut resp = ApiError::RateLimited { retry_after_secs: 1, trace_id: Some(request_id) }.into_response();
        apply_rate_limit_headers(&mut resp, &info, request_id);
        return resp;
    }

    req.extensions_mut().insert(key_info.clone());
    req.extensions_mut().insert(request_id);

    // From here on, every exit path (early handler return, panic unwind
    // caught by `Next`, or the body being dropped mid-stream on client
    // disconnect) must release the concurrency slot exactly once.
    let response = next.run(req).await;
    let (parts, body) = response.into_parts();
    let guarded_body = ReleaseGuardedBody::new(body, state.rate_limiter.clone(), key_info.key_id);
    let mut response = Response::from_parts(parts, Body::new(guarded_body));
    apply_rate_limit_headers(&mut response, &info, request_id);
    state.metrics.record_admission("allowed");
    response
}

fn bearer_secret(req: &Request<Body>) -> Option<String> {
    let header = req.headers().get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    header.strip_prefix("Bearer ").map(|s| s.to_string())
}

fn apply_rate_limit_headers(resp: &mut Response, info: &crate::rate_limiter::RateLimitInfo, request_id: Uuid) {
    let headers = resp.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert("X-Request-ID", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.reset_at_unix.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

pub fn require_key_info(req: &Request<Body>) -> Result<KeyInfo, ApiError> {
    req.extensions().get::<KeyInfo>().cloned().ok_or(ApiError::Internal { trace_id: None, message: Some("missing key info".into()) })
}
