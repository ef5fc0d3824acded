use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Errors from `Authenticator::validate`. Every variant maps the caller to
/// HTTP 401 except `Unavailable`, which maps to 503 (the store being down is
/// not the caller's fault and must not be confused with a bad credential).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid api key")]
    InvalidKey,
    #[error("api key expired")]
    ExpiredKey,
    #[error("api key disabled")]
    DisabledKey,
    #[error("tenant disabled")]
    DisabledTenant,
    #[error("environment disabled")]
    DisabledEnvironment,
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidKey => "invalid_key",
            AuthError::ExpiredKey => "expired_key",
            AuthError::DisabledKey => "disabled_key",
            AuthError::DisabledTenant => "disabled_tenant",
            AuthError::DisabledEnvironment => "disabled_environment",
            AuthError::Unavailable(_) => "authenticator_unavailable",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        };
        let body = ErrorBody { code: self.code(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
