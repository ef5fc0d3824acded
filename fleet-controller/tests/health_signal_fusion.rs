use chrono::Utc;
use fleet_controller::health_monitor::{evaluate, FusedHealth, SignalsStore};
use uuid::Uuid;

#[tokio::test]
async fn signals_store_feeds_fusion_end_to_end() {
    let store = SignalsStore::new();
    let node_id = Uuid::new_v4();
    let now = Utc::now();

    store.record_heartbeat(node_id, true, now).await;
    store.record_poll(node_id, true, now).await;
    store.record_cloud(node_id, true, now).await;

    let snapshot = store.snapshot(node_id).await;
    assert_eq!(evaluate(snapshot, now, 30, 30, 60), FusedHealth::Healthy);
}

#[tokio::test]
async fn stale_heartbeat_degrades_even_with_fresh_poll_and_cloud() {
    let store = SignalsStore::new();
    let node_id = Uuid::new_v4();
    let now = Utc::now();

    store.record_heartbeat(node_id, true, now - chrono::Duration::seconds(90)).await;
    store.record_poll(node_id, true, now).await;
    store.record_cloud(node_id, true, now).await;

    let snapshot = store.snapshot(node_id).await;
    assert_eq!(evaluate(snapshot, now, 30, 30, 60), FusedHealth::Degraded);
}

#[tokio::test]
async fn unknown_node_has_no_fresh_signals_and_reads_dead() {
    let store = SignalsStore::new();
    let snapshot = store.snapshot(Uuid::new_v4()).await;
    assert_eq!(evaluate(snapshot, Utc::now(), 30, 30, 60), FusedHealth::Dead);
}
