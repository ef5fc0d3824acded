use common_events::{DomainEventKind, EventProducer};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn emits_node_health_changed_noop() {
    let producer = EventProducer::noop("fleet-controller");
    let tenant = Uuid::new_v4();
    let ev = producer
        .emit(Some(tenant), DomainEventKind::NodeHealthChanged, None, json!({"node_id": "n-1", "state": "healthy"}))
        .await
        .expect("emit");
    assert_eq!(ev.tenant_id, Some(tenant));
    assert_eq!(ev.kind, DomainEventKind::NodeHealthChanged);
}

#[tokio::test]
async fn usage_recorded_falls_back_to_event_id_key_without_a_tenant() {
    let producer = EventProducer::noop("gateway");
    let ev = producer
        .emit(None, DomainEventKind::UsageRecorded, Some(Uuid::new_v4()), json!({"request_id": "r-1"}))
        .await
        .expect("emit");
    assert_eq!(ev.tenant_id, None);
}

#[test]
fn topics_are_stable_per_kind() {
    assert_eq!(DomainEventKind::NodeHealthChanged.topic(), "fleet.node_events");
    assert_eq!(DomainEventKind::UsageRecorded.topic(), "billing.usage_events");
    assert_eq!(DomainEventKind::WebhookReceived.topic(), "billing.webhook_events");
    assert_eq!(DomainEventKind::BillingRollupCompleted.topic(), "billing.rollup_events");
}
