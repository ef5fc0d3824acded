use crate::config::GatewayConfig;
use crate::load_balancer::LoadBalancer;
use crate::metrics::GatewayMetrics;
use crate::rate_limiter::RateLimiter;
use crate::usage::UsageRecorder;
use common_auth::Authenticator;
use common_events::EventProducer;
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub authenticator: Arc<Authenticator>,
    pub rate_limiter: RateLimiter,
    pub load_balancer: Arc<LoadBalancer>,
    pub usage: UsageRecorder,
    pub events: Arc<EventProducer>,
    pub metrics: Arc<GatewayMetrics>,
    pub http_client: Client,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        authenticator: Authenticator,
        rate_limiter: RateLimiter,
        load_balancer: LoadBalancer,
        events: EventProducer,
        metrics: GatewayMetrics,
        config: GatewayConfig,
    ) -> Self {
        let usage = UsageRecorder::new(pool.clone(), Duration::from_secs(config.usage_flush_timeout_secs));
        let http_client = Client::builder().build().expect("reqwest client");
        Self {
            pool,
            authenticator: Arc::new(authenticator),
            rate_limiter,
            load_balancer: Arc::new(load_balancer),
            usage,
            events: Arc::new(events),
            metrics: Arc::new(metrics),
            http_client,
            config: Arc::new(config),
        }
    }
}
