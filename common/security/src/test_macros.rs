//! Shared test helper macro for constructing security headers quickly.
//! Usage: test_request_headers!(req, tier="pro", tenant="<uuid>", env="<uuid>", key="<uuid>");
#[macro_export]
macro_rules! test_request_headers {
    ($req:expr, tier=$tier:expr, tenant=$tenant:expr, env=$env:expr, key=$key:expr) => {{
        let h = $req.headers_mut();
        h.insert("X-Tenant-ID", ::axum::http::HeaderValue::from_str($tenant).unwrap());
        h.insert("X-Environment-ID", ::axum::http::HeaderValue::from_str($env).unwrap());
        h.insert("X-Key-ID", ::axum::http::HeaderValue::from_str($key).unwrap());
        h.insert("X-Tier", ::axum::http::HeaderValue::from_str($tier).unwrap());
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn macro_compiles() {
        let mut req = ::axum::http::Request::builder().uri("/").body(::axum::body::Body::empty()).unwrap();
        test_request_headers!(
            req,
            tier = "pro",
            tenant = "11111111-1111-1111-1111-111111111111",
            env = "22222222-2222-2222-2222-222222222222",
            key = "33333333-3333-3333-3333-333333333333"
        );
        assert!(req.headers().get("X-Tier").is_some());
    }
}
