mod metrics;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

pub use metrics::http_error_metrics_layer;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Serialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// The full taxonomy from the error-handling design: client-input, auth,
/// admission, capacity, transient-upstream, and unclassified-internal.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    PayloadTooLarge { trace_id: Option<Uuid> },
    UnsupportedMediaType { trace_id: Option<Uuid> },
    Unprocessable { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Unauthorized { code: &'static str, trace_id: Option<Uuid> },
    TierRestricted { required_tier: &'static str, trace_id: Option<Uuid> },
    RateLimited { retry_after_secs: u64, trace_id: Option<Uuid> },
    ServiceUnavailable { trace_id: Option<Uuid>, message: Option<String> },
    BadGateway { trace_id: Option<Uuid> },
    NotImplemented { trace_id: Option<Uuid> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self {
        Self::Internal { trace_id, message: Some(e.to_string()) }
    }

    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code, trace_id, message: None }
    }

    fn parts(&self) -> (StatusCode, &'static str, &'static str, Option<String>, Option<u64>) {
        match self {
            ApiError::BadRequest { code, message, .. } => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", code, message.clone(), None)
            }
            ApiError::NotFound { code, .. } => {
                (StatusCode::NOT_FOUND, "invalid_request_error", code, None, None)
            }
            ApiError::Conflict { code, message, .. } => {
                (StatusCode::CONFLICT, "invalid_request_error", code, message.clone(), None)
            }
            ApiError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "invalid_request_error",
                "payload_too_large",
                None,
                None,
            ),
            ApiError::UnsupportedMediaType { .. } => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "invalid_request_error",
                "unsupported_media_type",
                None,
                None,
            ),
            ApiError::Unprocessable { code, message, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request_error", code, message.clone(), None)
            }
            ApiError::Unauthorized { code, .. } => {
                (StatusCode::UNAUTHORIZED, "authentication_error", code, None, None)
            }
            ApiError::TierRestricted { required_tier, .. } => (
                StatusCode::FORBIDDEN,
                "tier_restriction_error",
                "tier_restricted",
                Some(format!("requires tier {required_tier} or higher")),
                None,
            ),
            ApiError::RateLimited { retry_after_secs, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "rate_limited",
                None,
                Some(*retry_after_secs),
            ),
            ApiError::ServiceUnavailable { message, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "service_unavailable",
                message.clone(),
                None,
            ),
            ApiError::BadGateway { .. } => {
                (StatusCode::BAD_GATEWAY, "service_unavailable", "bad_gateway", None, None)
            }
            ApiError::NotImplemented { .. } => {
                (StatusCode::NOT_IMPLEMENTED, "invalid_request_error", "not_implemented", None, None)
            }
            ApiError::Internal { message, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal_error", message.clone(), None)
            }
        }
    }

    fn trace_id(&self) -> Option<Uuid> {
        match self {
            ApiError::BadRequest { trace_id, .. }
            | ApiError::NotFound { trace_id, .. }
            | ApiError::Conflict { trace_id, .. }
            | ApiError::PayloadTooLarge { trace_id }
            | ApiError::UnsupportedMediaType { trace_id }
            | ApiError::Unprocessable { trace_id, .. }
            | ApiError::Unauthorized { trace_id, .. }
            | ApiError::TierRestricted { trace_id, .. }
            | ApiError::RateLimited { trace_id, .. }
            | ApiError::ServiceUnavailable { trace_id, .. }
            | ApiError::BadGateway { trace_id }
            | ApiError::NotImplemented { trace_id }
            | ApiError::Internal { trace_id, .. } => *trace_id,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let trace_id = self.trace_id();
        let (status, error_type, code, message, retry_after) = self.parts();

        metrics::record_error_code(code);

        let body = ErrorEnvelope {
            error: ErrorBody {
                error_type,
                code: code.to_string(),
                message,
                trace_id,
                retry_after,
            },
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        if let Some(secs) = retry_after {
            if let Ok(val) = HeaderValue::from_str(&secs.to_string()) {
                resp.headers_mut().insert("Retry-After", val);
            }
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
