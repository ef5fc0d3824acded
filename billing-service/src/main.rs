use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use billing_service::aggregator::{spawn_billing_export, spawn_hourly_rollup};
use billing_service::config::BillingConfig;
use billing_service::webhook_handlers::stripe_webhook;
use billing_service::webhook_kv::{RedisWebhookKv, WebhookKv};
use billing_service::AppState;
use common_events::EventProducer;
use common_observability::init_tracing;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("billing-service");

    let config = BillingConfig::from_env()?;

    let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    let webhook_kv: Arc<dyn WebhookKv> = Arc::new(RedisWebhookKv::connect(&config.redis_url).await?);
    let events = EventProducer::noop(config.source_service.clone());

    let state = AppState::new(pool, webhook_kv, events, config.clone());

    spawn_hourly_rollup(state.clone());
    spawn_billing_export(state.clone());

    let app = Router::new()
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "billing-service listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}
