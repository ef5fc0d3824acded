use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DOMAIN_EVENT_VERSION: u32 = 1;

/// Identifies which subsystem produced an event and what it means, independent
/// of the Kafka topic it lands on. Kept as a plain string enum so new kinds
/// don't require a schema migration, only a new match arm at the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEventKind {
    NodeHealthChanged,
    NodeLaunched,
    NodeTerminated,
    UsageRecorded,
    WebhookReceived,
    BillingRollupCompleted,
}

impl DomainEventKind {
    pub fn topic(self) -> &'static str {
        match self {
            DomainEventKind::NodeHealthChanged
            | DomainEventKind::NodeLaunched
            | DomainEventKind::NodeTerminated => "fleet.node_events",
            DomainEventKind::UsageRecorded => "billing.usage_events",
            DomainEventKind::WebhookReceived => "billing.webhook_events",
            DomainEventKind::BillingRollupCompleted => "billing.rollup_events",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub event_version: u32,
    pub tenant_id: Option<Uuid>,
    pub kind: DomainEventKind,
    pub occurred_at: DateTime<Utc>,
    pub source_service: String,
    pub trace_id: Option<Uuid>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("producer not configured")]
    NotConfigured,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("kafka error: {0}")]
    Kafka(String),
}

pub type EventResult<T> = Result<T, EventError>;
