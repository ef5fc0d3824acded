use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub database_url: String,
    pub redis_url: String,
    pub redis_prefix: String,
    pub bind_addr: String,
    pub source_service: String,
    pub stripe_webhook_secret: String,
    pub webhook_max_skew_secs: i64,
    pub webhook_processing_ttl_secs: u64,
    pub webhook_processed_ttl_secs: u64,
    pub billing_export_base_url: Option<String>,
    pub billing_export_api_token: Option<String>,
    pub hourly_rollup_interval_secs: u64,
    pub billing_export_interval_secs: u64,
}

impl BillingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            redis_prefix: env::var("BILLING_REDIS_PREFIX").unwrap_or_else(|_| "billing".to_string()),
            bind_addr: env::var("BILLING_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8082".to_string()),
            source_service: "billing-service".to_string(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").context("STRIPE_WEBHOOK_SECRET must be set")?,
            webhook_max_skew_secs: env_i64("WEBHOOK_MAX_SKEW_SECS", 300),
            webhook_processing_ttl_secs: env_u64("WEBHOOK_PROCESSING_TTL_SECONDS", 300),
            webhook_processed_ttl_secs: env_u64("WEBHOOK_PROCESSED_TTL_SECONDS", 86_400),
            billing_export_base_url: env::var("BILLING_EXPORT_BASE_URL").ok(),
            billing_export_api_token: env::var("BILLING_EXPORT_API_TOKEN").ok(),
            hourly_rollup_interval_secs: env_u64("BILLING_ROLLUP_INTERVAL_SECONDS", 3600),
            billing_export_interval_secs: env_u64("BILLING_EXPORT_INTERVAL_SECONDS", 300),
        })
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
