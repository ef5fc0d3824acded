//! Constant-time `X-Admin-Token` check for the admin node-lifecycle surface.
//! Independent of tenant API key authentication: this guards operator
//! routes, not tenant-facing ones.

use crate::app_state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use subtle::ConstantTimeEq;

pub async fn require_admin_token(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let presented = req.headers().get("X-Admin-Token").and_then(|v| v.to_str().ok()).unwrap_or("");
    let expected = state.config.admin_token.as_bytes();
    let matches = presented.len() == expected.len() && bool::from(presented.as_bytes().ct_eq(expected));
    if !matches {
        return ApiError::Unauthorized { code: "invalid_admin_token", trace_id: None }.into_response();
    }
    next.run(req).await
}
