/// Runtime configuration for the Authenticator.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// TTL for the positive-result cache. Correctness under tenant/key
    /// suspension depends on this being short.
    pub cache_ttl_secs: u64,
    /// Bound on the fire-and-forget `last_used_at` update issued after a DB read.
    pub touch_timeout_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self {
            cache_ttl_secs: std::env::var("AUTH_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            touch_timeout_secs: std::env::var("AUTH_TOUCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 60, touch_timeout_secs: 5 }
    }
}
