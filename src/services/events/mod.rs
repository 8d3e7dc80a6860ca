//! Outbound events.
//!
//! [`EventProducer`] is owned by the application state and runs a single
//! delivery task that drains a bounded queue into an [`EventPublisher`] sink.
//! Publishing never blocks or fails the caller: a full queue or a failing sink
//! only produces a log line.

mod log;
mod webhook;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use log::LogPublisher;
pub use webhook::WebhookPublisher;

use crate::config::EventsConfig;
use crate::ports::event_publisher::{EventPublisher, OutboundEvent};

pub const PLAYBACK_TOPIC: &str = "radio.playback.events";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub station_id: Uuid,
    pub track_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Seconds played, unknown while the track is still playing
    pub duration_seconds: Option<i32>,
    pub user_id: Option<String>,
}

impl PlaybackEvent {
    pub fn new(station_id: Uuid, track_id: Uuid, duration_seconds: Option<i32>) -> Self {
        Self {
            station_id,
            track_id,
            timestamp: Utc::now(),
            duration_seconds,
            user_id: None,
        }
    }

    /// Keyed by track so events for the same track stay ordered downstream.
    pub fn to_outbound(&self) -> OutboundEvent {
        OutboundEvent {
            topic: PLAYBACK_TOPIC.to_string(),
            key: self.track_id.to_string(),
            payload: serde_json::to_value(self).unwrap_or_default(),
        }
    }
}

pub fn publisher_from_config(config: &EventsConfig) -> color_eyre::Result<Arc<dyn EventPublisher>> {
    Ok(match &config.playback_webhook_url {
        Some(url) => {
            tracing::info!(url, "Publishing events to webhook");
            Arc::new(WebhookPublisher::new(url)?)
        }
        None => {
            tracing::info!("No event webhook configured, events will only be logged");
            Arc::new(LogPublisher)
        }
    })
}

pub struct EventProducer {
    sender: mpsc::Sender<OutboundEvent>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventProducer {
    /// Spawn the delivery task.
    pub fn start(sink: Arc<dyn EventPublisher>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_delivery(sink, receiver, cancel.clone()));
        tracing::info!(capacity, "Event producer started");

        Self {
            sender,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn publish(&self, event: OutboundEvent) {
        if self.cancel.is_cancelled() {
            tracing::warn!(topic = %event.topic, key = %event.key, "Event producer stopped, dropping event");
            return;
        }
        if let Err(e) = self.sender.try_send(event) {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            let event = e.into_inner();
            tracing::error!(topic = %event.topic, key = %event.key, reason, "Failed to queue event");
        }
    }

    pub fn publish_playback(&self, event: &PlaybackEvent) {
        self.publish(event.to_outbound());
    }

    /// Stop accepting events, deliver what is already queued and wait for the
    /// delivery task to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.task.lock().await.take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "Event delivery task failed");
        }
        tracing::info!("Event producer stopped");
    }
}

async fn run_delivery(
    sink: Arc<dyn EventPublisher>,
    mut receiver: mpsc::Receiver<OutboundEvent>,
    cancel: CancellationToken,
) {
    let published = opentelemetry::global::meter("radio-streaming")
        .u64_counter("events_published_total")
        .with_description("Outbound events handed to the sink, by outcome")
        .build();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => deliver(sink.as_ref(), &event, &published).await,
                None => return,
            },
        }
    }

    receiver.close();
    while let Some(event) = receiver.recv().await {
        deliver(sink.as_ref(), &event, &published).await;
    }
}

async fn deliver(sink: &dyn EventPublisher, event: &OutboundEvent, published: &Counter<u64>) {
    let outcome = match sink.publish(event).await {
        Ok(()) => {
            tracing::debug!(topic = %event.topic, key = %event.key, "Event published");
            "ok"
        }
        Err(e) => {
            tracing::error!(
                topic = %event.topic,
                key = %event.key,
                error = %e,
                "Event publish failed"
            );
            "failed"
        }
    };
    published.add(
        1,
        &[
            KeyValue::new("topic", event.topic.clone()),
            KeyValue::new("outcome", outcome),
        ],
    );
}
