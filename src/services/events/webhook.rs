use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use color_eyre::eyre::{Result, WrapErr, eyre};
use reqwest::Client;
use url::Url;

use crate::ports::event_publisher::{EventPublisher, OutboundEvent};

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the partition key to the receiving bus bridge.
pub const PARTITION_KEY_HEADER: &str = "X-Partition-Key";

/// Posts events as JSON to an HTTP endpoint (an event-bus bridge or an
/// analytics collector). Failed attempts are retried a few times with
/// exponential backoff.
pub struct WebhookPublisher {
    client: Client,
    url: Url,
}

impl WebhookPublisher {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).wrap_err_with(|| format!("Invalid webhook URL: {url}"))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }

    async fn try_send(&self, event: &OutboundEvent) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .header(PARTITION_KEY_HEADER, &event.key)
            .json(event)
            .send()
            .await
            .wrap_err("Webhook request failed")?;
        if !response.status().is_success() {
            return Err(eyre!("Webhook returned HTTP {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventPublisher for WebhookPublisher {
    async fn publish(&self, event: &OutboundEvent) -> Result<()> {
        (|| self.try_send(event))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(500))
                    .with_max_times(3),
            )
            .notify(|e, after| {
                tracing::warn!(
                    topic = %event.topic,
                    error = %e,
                    retry_in_ms = after.as_millis() as u64,
                    "Webhook delivery attempt failed, retrying"
                );
            })
            .await
    }
}
