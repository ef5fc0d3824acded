use crate::config::BillingConfig;
use crate::webhook_kv::WebhookKv;
use common_events::EventProducer;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub webhook_kv: Arc<dyn WebhookKv>,
    pub events: Arc<EventProducer>,
    pub config: Arc<BillingConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, webhook_kv: Arc<dyn WebhookKv>, events: EventProducer, config: BillingConfig) -> Self {
        Self { pool, webhook_kv, events: Arc::new(events), config: Arc::new(config) }
    }
}
