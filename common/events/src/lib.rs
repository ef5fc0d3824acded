pub mod model;
pub mod producer;

pub use model::{DomainEvent, DomainEventKind, EventError, EventResult, DOMAIN_EVENT_VERSION};
pub use producer::{EventProducer, EventProducerConfig, EventSink, NoopEventSink};
#[cfg(feature = "kafka-producer")]
pub use producer::KafkaEventSink;
