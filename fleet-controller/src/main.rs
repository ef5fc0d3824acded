use anyhow::Result;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use common_crypto::MasterKey;
use common_events::EventProducer;
use common_observability::init_tracing;
use fleet_controller::admin_auth::require_admin_token;
use fleet_controller::config::FleetConfig;
use fleet_controller::credential_store::CredentialStore;
use fleet_controller::provisioner::{MockProvisioner, ProvisionerAdapter};
use fleet_controller::{admin_stub_handlers, health_runner, node_handlers, repo};
use fleet_controller::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("fleet-controller");

    let config = FleetConfig::from_env()?;

    let pool = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;

    let master_key = MasterKey::from_base64(&config.master_key_base64)?;
    let credentials = CredentialStore::new(pool.clone(), master_key);

    let provisioner: Arc<dyn ProvisionerAdapter> = Arc::new(MockProvisioner::new());
    let events = EventProducer::noop(config.source_service.clone());

    let state = AppState::new(pool.clone(), credentials, provisioner, events, config.clone());

    spawn_poll_loop(state.clone());
    spawn_cloud_loop(state.clone());

    let admin_routes = Router::new()
        .route("/admin/nodes/launch", post(node_handlers::launch))
        .route("/admin/nodes/register", post(node_handlers::register))
        .route("/admin/nodes/:id/heartbeat", post(node_handlers::heartbeat))
        .route("/admin/nodes/:id/drain", post(node_handlers::drain))
        .route("/admin/nodes/:id/termination-warning", post(node_handlers::termination_warning))
        .route("/admin/nodes/:cluster/terminate", post(node_handlers::terminate))
        .route("/admin/nodes/:id/logs", get(node_handlers::get_logs))
        .route("/admin/nodes/:id/logs/stream", get(node_handlers::stream_logs))
        .route("/admin/tenants", get(admin_stub_handlers::list_tenants))
        .route("/admin/tenants/:id", get(admin_stub_handlers::get_tenant).put(stub).delete(stub))
        .route("/admin/models", get(stub).post(stub))
        .route("/admin/models/:id", get(stub).put(stub).delete(stub))
        .route("/admin/regions", get(stub).post(stub))
        .route("/admin/regions/:id", get(stub).put(stub).delete(stub))
        .route("/admin/instance-types", get(stub).post(stub))
        .route("/admin/instance-types/:id", get(stub).put(stub).delete(stub))
        .route("/admin/credentials", get(stub).post(stub))
        .route("/admin/credentials/:id", delete(stub))
        .route("/admin/deployments", get(stub).post(stub))
        .route("/admin/deployments/:id", get(stub).put(stub).delete(stub))
        .route("/admin/routes", get(stub).post(stub))
        .route("/admin/routes/:id", get(stub).put(stub).delete(stub))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin_token));

    let public_routes = Router::new().route("/health", get(health));

    let app = Router::new()
        .merge(admin_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "fleet-controller listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn stub() -> axum::response::Response {
    admin_stub_handlers::not_implemented().await
}

/// C5 poll signal: HTTP `GET {node.endpoint_url}/health` on every active node,
/// every `poll_interval_secs`, bounded by `poll_timeout_secs`.
fn spawn_poll_loop(state: AppState) {
    tokio::spawn(async move {
        let client = reqwest::Client::builder().timeout(state.config.poll_timeout()).build().expect("reqwest client");
        let mut ticker = tokio::time::interval(state.config.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let nodes = match repo::list_active_nodes(&state.pool).await {
                Ok(nodes) => nodes,
                Err(err) => {
                    tracing::warn!(?err, "failed to list active nodes for poll sweep");
                    continue;
                }
            };
            for node in nodes {
                let healthy = client.get(format!("{}/health", node.endpoint_url)).send().await.map(|r| r.status().is_success()).unwrap_or(false);
                state.signals.record_poll(node.id, healthy, chrono::Utc::now()).await;
                if let Err(err) = health_runner::evaluate_node(&state, node.id).await {
                    tracing::warn!(?err, node_id = %node.id, "failed to persist health evaluation");
                }
            }
        }
    });
}

/// C5 cloud signal: asks the provisioner for the authoritative cloud status
/// of every active node's cluster, every `cloud_interval_secs`.
fn spawn_cloud_loop(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.cloud_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let nodes = match repo::list_active_nodes(&state.pool).await {
                Ok(nodes) => nodes,
                Err(err) => {
                    tracing::warn!(?err, "failed to list active nodes for cloud sweep");
                    continue;
                }
            };
            for node in nodes {
                let healthy = match tokio::time::timeout(state.config.cloud_timeout(), state.provisioner.status(&node.cluster_handle)).await {
                    Ok(Ok(status)) => status.is_healthy(),
                    Ok(Err(err)) => {
                        tracing::warn!(?err, node_id = %node.id, "provisioner status check failed");
                        false
                    }
                    Err(_) => false,
                };
                state.signals.record_cloud(node.id, healthy, chrono::Utc::now()).await;
                if let Err(err) = health_runner::evaluate_node(&state, node.id).await {
                    tracing::warn!(?err, node_id = %node.id, "failed to persist health evaluation");
                }
            }
        }
    });
}
