use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use common_auth::Tier;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Identity bound to a request once the gateway's admission middleware has
/// authenticated it. Downstream handlers trust these headers because only
/// the gateway's internal network hop sets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    pub tenant_id: Uuid,
    pub environment_id: Uuid,
    pub key_id: Uuid,
    pub tier: Tier,
    pub trace_id: Option<Uuid>,
}

pub struct SecurityCtxExtractor(pub SecurityContext);

fn uuid_header(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers.get(name).and_then(|v| v.to_str().ok()).and_then(|s| Uuid::parse_str(s).ok())
}

fn tier_header(headers: &HeaderMap) -> Option<Tier> {
    headers.get("X-Tier").and_then(|v| v.to_str().ok()).and_then(|s| s.parse().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for SecurityCtxExtractor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let tenant_id = uuid_header(headers, "X-Tenant-ID")
            .ok_or_else(|| ApiError::bad_request("missing_tenant_id", None))?;
        let environment_id = uuid_header(headers, "X-Environment-ID")
            .ok_or_else(|| ApiError::bad_request("missing_environment_id", None))?;
        let key_id = uuid_header(headers, "X-Key-ID").ok_or_else(|| ApiError::bad_request("missing_key_id", None))?;
        let tier = tier_header(headers).ok_or_else(|| ApiError::bad_request("missing_tier", None))?;
        let trace_id = uuid_header(headers, "X-Trace-ID").or_else(|| Some(Uuid::new_v4()));

        Span::current().record("tenant_id", tracing::field::display(tenant_id));
        if let Some(tid) = trace_id.as_ref() {
            Span::current().record("trace_id", tracing::field::display(tid));
        }

        Ok(SecurityCtxExtractor(SecurityContext { tenant_id, environment_id, key_id, tier, trace_id }))
    }
}
