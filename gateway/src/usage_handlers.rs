//! `GET /v1/usage`, `/v1/metrics/*` — usage and analytics reporting.
//! Out of scope as a reporting surface; routed and tier-checked but not
//! implemented.

use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;

pub async fn usage_report() -> Response {
    ApiError::NotImplemented { trace_id: None }.into_response()
}

pub async fn metrics_report() -> Response {
    ApiError::NotImplemented { trace_id: None }.into_response()
}
