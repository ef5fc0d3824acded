use axum::body::Body;
use axum::http::Request;
use axum::routing::post;
use axum::Router;
use billing_service::config::BillingConfig;
use billing_service::webhook_handlers::stripe_webhook;
use billing_service::webhook_kv::InMemoryWebhookKv;
use billing_service::AppState;
use common_events::EventProducer;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

fn sign(secret: &str, ts: i64, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(ts.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

async fn test_state(pool: sqlx::PgPool) -> AppState {
    let config = BillingConfig {
        database_url: String::new(),
        redis_url: String::new(),
        redis_prefix: "test".into(),
        bind_addr: "0.0.0.0:0".into(),
        source_service: "billing-service".into(),
        stripe_webhook_secret: "whsec_test".into(),
        webhook_max_skew_secs: 300,
        webhook_processing_ttl_secs: 300,
        webhook_processed_ttl_secs: 86_400,
        billing_export_base_url: None,
        billing_export_api_token: None,
        hourly_rollup_interval_secs: 3600,
        billing_export_interval_secs: 300,
    };
    AppState::new(pool, Arc::new(InMemoryWebhookKv::new()), EventProducer::noop("billing-service"), config)
}

fn router(state: AppState) -> Router {
    Router::new().route("/api/webhooks/stripe", post(stripe_webhook)).with_state(state)
}

/// Replaying the same signed event body twice results in exactly one
/// mutation and exactly one audit row (requires a live Postgres; skipped
/// otherwise).
#[tokio::test]
#[ignore]
async fn replaying_a_signed_event_is_idempotent() {
    let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this ignored test");
    let pool = PgPoolOptions::new().max_connections(2).connect(&dsn).await.unwrap();
    let state = test_state(pool).await;

    let body = br#"{"id":"evt_test_1","type":"payment_succeeded","data":{"object":{"customer":"cus_test"}}}"#.to_vec();
    let ts = chrono::Utc::now().timestamp();
    let sig = sign("whsec_test", ts, &body);

    for _ in 0..2 {
        let app = router(state.clone());
        let req = Request::builder()
            .uri("/api/webhooks/stripe")
            .method("POST")
            .header("Stripe-Signature", &sig)
            .body(Body::from(body.clone()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_success());
    }

    let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM webhook_events WHERE external_event_id = $1").bind("evt_test_1").fetch_one(&state.pool).await.unwrap();
    assert_eq!(rows.0, 1);
}

#[tokio::test]
async fn bad_signature_is_rejected_with_400_and_never_reaches_the_database() {
    let config = BillingConfig {
        database_url: String::new(),
        redis_url: String::new(),
        redis_prefix: "test".into(),
        bind_addr: "0.0.0.0:0".into(),
        source_service: "billing-service".into(),
        stripe_webhook_secret: "whsec_test".into(),
        webhook_max_skew_secs: 300,
        webhook_processing_ttl_secs: 300,
        webhook_processed_ttl_secs: 86_400,
        billing_export_base_url: None,
        billing_export_api_token: None,
        hourly_rollup_interval_secs: 3600,
        billing_export_interval_secs: 300,
    };
    // No DB connection is ever attempted because signature verification
    // rejects the request first.
    let pool = PgPoolOptions::new().connect_lazy("postgres://unused/unused").unwrap();
    let state = AppState::new(pool, Arc::new(InMemoryWebhookKv::new()), EventProducer::noop("billing-service"), config);

    let body = br#"{"id":"evt_test_2","type":"payment_succeeded","data":{"object":{"customer":"cus_test"}}}"#.to_vec();
    let ts = chrono::Utc::now().timestamp();
    let sig = sign("wrong-secret", ts, &body);

    let app = router(state);
    let req = Request::builder().uri("/api/webhooks/stripe").method("POST").header("Stripe-Signature", &sig).body(Body::from(body)).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
