use anyhow::Result;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::Router;
use common_auth::{AuthConfig, Authenticator};
use common_events::EventProducer;
use common_observability::init_tracing;
use gateway::admission::admission_middleware;
use gateway::app_state::AppState;
use gateway::config::GatewayConfig;
use gateway::db::PgKeyStore;
use gateway::load_balancer::LoadBalancer;
use gateway::metrics::GatewayMetrics;
use gateway::rate_limiter::{RateLimiter, RedisRateLimitKv};
use gateway::{api_key_handlers, catalog_handlers, inference_handlers, repo, usage_handlers};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("gateway");

    let config = GatewayConfig::from_env()?;

    let pool = PgPoolOptions::new().max_connections(20).connect(&config.database_url).await?;

    let key_store = Arc::new(PgKeyStore::new(pool.clone()));
    let authenticator = Authenticator::new(key_store, AuthConfig::from_env());

    let rate_kv = Arc::new(RedisRateLimitKv::connect(&config.redis_url).await?);
    let rate_limiter = RateLimiter::new(rate_kv, config.redis_prefix.clone());

    let load_balancer = LoadBalancer::new();
    let metrics = GatewayMetrics::new()?;
    let events = EventProducer::noop(config.source_service.clone());

    let state = AppState::new(pool.clone(), authenticator, rate_limiter, load_balancer, events, metrics, config.clone());

    spawn_fleet_sweeper(state.clone());
    spawn_queue_depth_poller(state.clone());

    let tenant_routes = Router::new()
        .route("/v1/chat/completions", post(inference_handlers::chat_completions))
        .route("/v1/completions", post(inference_handlers::completions))
        .route("/v1/embeddings", post(inference_handlers::embeddings))
        .route("/v1/api-keys", post(api_key_handlers::create_api_key).get(api_key_handlers::list_api_keys))
        .route("/v1/api-keys/:id", delete(api_key_handlers::delete_api_key))
        .route("/v1/usage", get(usage_handlers::usage_report))
        .route("/v1/metrics/:kind", get(usage_handlers::metrics_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), admission_middleware));

    let public_routes = Router::new()
        .route("/v1/models", get(catalog_handlers::list_models))
        .route("/v1/models/:name", get(catalog_handlers::get_model))
        .route("/v1/endpoints", get(catalog_handlers::list_endpoints))
        .route("/v1/endpoints/:name", get(catalog_handlers::get_endpoint))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics));

    let app = Router::new()
        .merge(tenant_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(axum::extract::State(state): axum::extract::State<AppState>) -> axum::response::Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => {
            tracing::error!(?err, "failed to render metrics");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Periodically drops `EndpointStats` entries for nodes that are both stale
/// and no longer present among live nodes, and republishes the live
/// endpoint count so it can be scraped.
fn spawn_fleet_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.queue_poll_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match repo::live_endpoints(&state.pool).await {
                Ok(live) => {
                    state.metrics.set_endpoints_tracked(live.len() as i64);
                    state.load_balancer.sweep_stale(state.config.stats_staleness_secs as i64, &live).await;
                }
                Err(err) => {
                    tracing::warn!(?err, "failed to load live endpoints for sweep");
                }
            }
        }
    });
}

#[derive(serde::Deserialize)]
struct VendorQueueMetrics {
    queue_depth: u32,
    active_requests: u32,
}

/// Polls each active endpoint's vendor-specific metrics URL to refresh
/// `{queue_depth, active_requests}`. A failed poll leaves the previous
/// values in place; becoming stale is itself a signal via `last_updated`.
fn spawn_queue_depth_poller(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.queue_poll_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let endpoints = match repo::active_endpoint_urls(&state.pool).await {
                Ok(endpoints) => endpoints,
                Err(err) => {
                    tracing::warn!(?err, "failed to load active endpoints for queue poll");
                    continue;
                }
            };
            for endpoint in endpoints {
                let url = format!("{}/metrics", endpoint.trim_end_matches('/'));
                let result = state.http_client.get(&url).timeout(Duration::from_secs(3)).send().await;
                let metrics = match result {
                    Ok(resp) => resp.json::<VendorQueueMetrics>().await.ok(),
                    Err(_) => None,
                };
                if let Some(m) = metrics {
                    state.load_balancer.update_queue_depth(&endpoint, m.queue_depth, m.active_requests).await;
                } else {
                    tracing::debug!(%endpoint, "vendor queue metrics poll failed, leaving stats in place");
                }
            }
        }
    });
}
