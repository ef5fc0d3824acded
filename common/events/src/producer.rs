use crate::model::{DomainEvent, DomainEventKind, EventError, EventResult, DOMAIN_EVENT_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

/// Destination for a serialized domain event. Swappable so tests and
/// single-binary deployments don't need a live Kafka cluster.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> EventResult<()>;
}

/// Drops every event. Used in tests and wherever event emission is
/// best-effort and a broker isn't configured.
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn send(&self, _topic: &str, _key: &str, _payload: &[u8]) -> EventResult<()> {
        Ok(())
    }
}

#[cfg(feature = "kafka-producer")]
pub struct KafkaEventSink {
    inner: rdkafka::producer::FutureProducer,
}

#[cfg(feature = "kafka-producer")]
impl KafkaEventSink {
    pub fn new(inner: rdkafka::producer::FutureProducer) -> Self {
        Self { inner }
    }
}

#[cfg(feature = "kafka-producer")]
#[async_trait]
impl EventSink for KafkaEventSink {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> EventResult<()> {
        use rdkafka::producer::FutureRecord;
        use std::time::Duration;

        let record = FutureRecord::to(topic).key(key).payload(payload);
        self.inner
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| EventError::Kafka(e.to_string()))?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventProducerConfig {
    pub source_service: String,
}

pub struct EventProducer {
    sink: Box<dyn EventSink>,
    config: EventProducerConfig,
}

impl EventProducer {
    pub fn new(sink: impl EventSink + 'static, config: EventProducerConfig) -> Self {
        Self { sink: Box::new(sink), config }
    }

    pub fn noop(source_service: impl Into<String>) -> Self {
        Self::new(NoopEventSink, EventProducerConfig { source_service: source_service.into() })
    }

    pub async fn emit(
        &self,
        tenant_id: Option<Uuid>,
        kind: DomainEventKind,
        trace_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> EventResult<DomainEvent> {
        let event = DomainEvent {
            event_id: Uuid::new_v4(),
            event_version: DOMAIN_EVENT_VERSION,
            tenant_id,
            kind,
            occurred_at: Utc::now(),
            source_service: self.config.source_service.clone(),
            trace_id,
            payload,
        };
        let serialized = serde_json::to_vec(&event).map_err(|e| EventError::Serialization(e.to_string()))?;
        let key = tenant_id.map(|t| t.to_string()).unwrap_or_else(|| event.event_id.to_string());
        self.sink.send(kind.topic(), &key, &serialized).await?;
        Ok(event)
    }
}
