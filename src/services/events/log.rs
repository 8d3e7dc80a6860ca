use color_eyre::eyre::Result;

use crate::ports::event_publisher::{EventPublisher, OutboundEvent};

/// Sink used when no event bus is configured; events end up in the logs.
pub struct LogPublisher;

#[async_trait::async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &OutboundEvent) -> Result<()> {
        tracing::info!(
            topic = %event.topic,
            key = %event.key,
            payload = %event.payload,
            "Outbound event"
        );
        Ok(())
    }
}
