use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub admin_token: String,
    pub master_key_base64: String,
    pub source_service: String,

    pub heartbeat_timeout_secs: i64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub cloud_interval_secs: u64,
    pub cloud_timeout_secs: u64,
}

impl FleetConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: env::var("FLEET_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8081".to_string()),
            admin_token: env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?,
            master_key_base64: env::var("CREDENTIAL_MASTER_KEY").context("CREDENTIAL_MASTER_KEY must be set")?,
            source_service: "fleet-controller".to_string(),

            heartbeat_timeout_secs: env_i64("FLEET_HEARTBEAT_TIMEOUT_SECONDS", 30),
            poll_interval_secs: env_u64("FLEET_POLL_INTERVAL_SECONDS", 30),
            poll_timeout_secs: env_u64("FLEET_POLL_TIMEOUT_SECONDS", 5),
            cloud_interval_secs: env_u64("FLEET_CLOUD_INTERVAL_SECONDS", 60),
            cloud_timeout_secs: env_u64("FLEET_CLOUD_TIMEOUT_SECONDS", 10),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn cloud_interval(&self) -> Duration {
        Duration::from_secs(self.cloud_interval_secs)
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_secs(self.cloud_timeout_secs)
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
