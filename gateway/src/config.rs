use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub database_url: String,
    pub redis_url: String,
    pub redis_prefix: String,
    pub bind_addr: String,
    pub admin_token: String,
    pub source_service: String,

    pub default_rpm: u32,
    pub default_tpm: u32,
    pub default_concurrency: u32,
    pub environment_rpm: u32,
    pub tenant_rpm: u32,

    pub request_timeout_secs: u64,
    pub inference_timeout_secs: u64,
    pub usage_flush_timeout_secs: u64,

    pub queue_poll_interval_secs: u64,
    pub stats_staleness_secs: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url = env::var("REDIS_URL").context("REDIS_URL must be set")?;
        let admin_token = env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?;

        Ok(Self {
            database_url,
            redis_url,
            redis_prefix: env::var("GATEWAY_RATE_LIMIT_PREFIX").unwrap_or_else(|_| "gateway:rate".to_string()),
            bind_addr: env::var("GATEWAY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            admin_token,
            source_service: "gateway".to_string(),

            default_rpm: env_u32("GATEWAY_DEFAULT_RPM", 60),
            default_tpm: env_u32("GATEWAY_DEFAULT_TPM", 60_000),
            default_concurrency: env_u32("GATEWAY_DEFAULT_CONCURRENCY", 10),
            environment_rpm: env_u32("GATEWAY_ENVIRONMENT_RPM", 10_000),
            tenant_rpm: env_u32("GATEWAY_TENANT_RPM", 50_000),

            request_timeout_secs: env_u64("GATEWAY_REQUEST_TIMEOUT_SECONDS", 60),
            inference_timeout_secs: env_u64("GATEWAY_INFERENCE_TIMEOUT_SECONDS", 600),
            usage_flush_timeout_secs: env_u64("GATEWAY_USAGE_FLUSH_TIMEOUT_SECONDS", 5),

            queue_poll_interval_secs: env_u64("GATEWAY_QUEUE_POLL_INTERVAL_SECONDS", 5),
            stats_staleness_secs: env_u64("GATEWAY_STATS_STALENESS_SECONDS", 120),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
