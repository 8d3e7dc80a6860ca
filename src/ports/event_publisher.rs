use color_eyre::eyre::Result;
use serde::Serialize;

/// A message bound for the external event bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEvent {
    pub topic: String,
    /// Partition key; events with the same key are delivered in order.
    pub key: String,
    pub payload: serde_json::Value,
}

/// Port trait for the external event bus.
///
/// Callers go through `services::events::EventProducer`, which owns the
/// delivery task and swallows failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OutboundEvent) -> Result<()>;
}
