use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{IngestError, TrackDownloaded, TrackIngestor};
use crate::config::IngestConfig;
use crate::services::metrics::StreamMetrics;

const RETRY_MIN_DELAY: Duration = Duration::from_millis(200);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("Ingest queue is full")]
    Full,
    #[error("Ingest queue is closed")]
    Closed,
}

/// Producer side of the ingest queue, handed to the feed endpoint.
#[derive(Clone)]
pub struct IngestQueue {
    sender: mpsc::Sender<TrackDownloaded>,
}

impl IngestQueue {
    /// Queue a notification without waiting for room.
    pub fn enqueue(&self, message: TrackDownloaded) -> Result<(), EnqueueError> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

/// Consumes queued notifications one at a time.
pub struct IngestWorker {
    service: Arc<dyn TrackIngestor>,
    receiver: mpsc::Receiver<TrackDownloaded>,
    metrics: Arc<StreamMetrics>,
    max_retries: usize,
    transaction_timeout: Duration,
}

impl IngestWorker {
    pub fn new(
        service: Arc<dyn TrackIngestor>,
        metrics: Arc<StreamMetrics>,
        config: &IngestConfig,
    ) -> (IngestQueue, Self) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = Self {
            service,
            receiver,
            metrics,
            max_retries: config.max_retries,
            transaction_timeout: config.transaction_timeout(),
        };
        (IngestQueue { sender }, worker)
    }

    /// Run until `cancel` fires or every [`IngestQueue`] is dropped. A
    /// notification that is being applied when `cancel` fires is finished
    /// first; notifications still waiting in the queue are not taken.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            max_retries = self.max_retries,
            transaction_timeout_secs = self.transaction_timeout.as_secs(),
            "Ingest worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(pending = self.receiver.len(), "Ingest worker stopping");
                    break;
                }
                message = self.receiver.recv() => match message {
                    Some(message) => {
                        self.process(&message, &cancel).await;
                    }
                    None => {
                        tracing::info!("Ingest queue closed, worker stopping");
                        break;
                    }
                },
            }
        }

        self.receiver.close();
    }

    /// Apply one notification with retries; returns the recorded outcome label.
    async fn process(&self, message: &TrackDownloaded, cancel: &CancellationToken) -> &'static str {
        let service = &self.service;
        let timeout = self.transaction_timeout;

        let result = (|| async move {
            match tokio::time::timeout(timeout, service.ingest(message)).await {
                Ok(result) => result,
                Err(_) => Err(IngestError::Timeout(timeout)),
            }
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(RETRY_MIN_DELAY)
                .with_max_delay(RETRY_MAX_DELAY)
                .with_max_times(self.max_retries),
        )
        .when(|_| !cancel.is_cancelled())
        .notify(|e, after| {
            tracing::warn!(
                file_path = ?message.file_path,
                error = %e,
                retry_in_ms = after.as_millis() as u64,
                "Ingest attempt failed, retrying"
            );
        })
        .await;

        let label = match result {
            Ok(outcome) => outcome.label(),
            Err(e) => {
                tracing::error!(
                    file_path = ?message.file_path,
                    url = ?message.url,
                    error = %e,
                    "Dropping download notification after retries"
                );
                "failed"
            }
        };
        self.metrics.record_ingest(label);
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DEFAULT_TENANT_ID;
    use crate::services::ingest::{IngestOutcome, IngestService, MockTrackIngestor};
    use sea_orm::DbErr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;
    use crate::entities;
    use crate::entities::radio_station::StationType;
    use crate::test_utils::{insert_station, test_db};
    use sea_orm::{EntityTrait, PaginatorTrait};

    fn config(queue_capacity: usize) -> IngestConfig {
        IngestConfig {
            queue_capacity,
            max_retries: 2,
            transaction_timeout_secs: 5,
        }
    }

    fn message(file_path: &str) -> TrackDownloaded {
        TrackDownloaded {
            file_path: Some(file_path.to_string()),
            title: Some("X".to_string()),
            artist: Some("Y".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_worker_ingests_queued_messages() {
        let db = test_db().await;
        insert_station(&db, "Past Performers", StationType::Past, true).await;
        let service = Arc::new(IngestService::new(db.clone(), DEFAULT_TENANT_ID));
        let (queue, worker) = IngestWorker::new(service, Arc::new(StreamMetrics::new()), &config(8));
        let handle = worker.spawn(CancellationToken::new());

        queue.enqueue(message("a.mp3")).unwrap();
        queue.enqueue(message("b.mp3")).unwrap();
        queue.enqueue(message("a.mp3")).unwrap();
        queue.enqueue(TrackDownloaded::default()).unwrap();

        // Dropping the last producer lets the worker drain and exit
        drop(queue);
        handle.await.unwrap();

        let tracks = entities::track::Entity::find().count(&db.conn).await.unwrap();
        assert_eq!(tracks, 2);
        let links = entities::station_track::Entity::find()
            .count(&db.conn)
            .await
            .unwrap();
        assert_eq!(links, 2);
    }

    #[tokio::test]
    async fn test_enqueue_reports_full_queue() {
        let db = test_db().await;
        let service = Arc::new(IngestService::new(db, DEFAULT_TENANT_ID));
        let (queue, _worker) = IngestWorker::new(service, Arc::new(StreamMetrics::new()), &config(1));

        queue.enqueue(message("a.mp3")).unwrap();
        assert_eq!(queue.enqueue(message("b.mp3")), Err(EnqueueError::Full));
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stops_reports_closed() {
        let db = test_db().await;
        let service = Arc::new(IngestService::new(db, DEFAULT_TENANT_ID));
        let (queue, worker) = IngestWorker::new(service, Arc::new(StreamMetrics::new()), &config(4));

        let cancel = CancellationToken::new();
        let handle = worker.spawn(cancel.clone());
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(queue.enqueue(message("a.mp3")), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn test_cancelled_worker_leaves_pending_messages() {
        let db = test_db().await;
        let service = Arc::new(IngestService::new(db.clone(), DEFAULT_TENANT_ID));
        let (queue, worker) = IngestWorker::new(service, Arc::new(StreamMetrics::new()), &config(4));

        queue.enqueue(message("a.mp3")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        worker.spawn(cancel).await.unwrap();

        let tracks = entities::track::Entity::find().count(&db.conn).await.unwrap();
        assert_eq!(tracks, 0);
    }

    fn ingested() -> IngestOutcome {
        IngestOutcome::Ingested {
            track_id: Uuid::new_v4(),
            artist_id: Uuid::new_v4(),
            linked_stations: 1,
        }
    }

    fn locked() -> IngestError {
        IngestError::Database(DbErr::Custom("database is locked".to_string()))
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let mut ingestor = MockTrackIngestor::new();
        ingestor.expect_ingest().times(2).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(locked())
            } else {
                Ok(ingested())
            }
        });

        let (_queue, worker) =
            IngestWorker::new(Arc::new(ingestor), Arc::new(StreamMetrics::new()), &config(4));
        let label = worker.process(&message("a.mp3"), &CancellationToken::new()).await;

        assert_eq!(label, "ingested");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_message_dropped_after_retries_run_out() {
        let mut ingestor = MockTrackIngestor::new();
        // One initial attempt plus `max_retries` retries
        ingestor
            .expect_ingest()
            .times(3)
            .returning(|_| Err(locked()));

        let (_queue, worker) =
            IngestWorker::new(Arc::new(ingestor), Arc::new(StreamMetrics::new()), &config(4));
        let label = worker.process(&message("a.mp3"), &CancellationToken::new()).await;

        assert_eq!(label, "failed");
    }

    #[tokio::test]
    async fn test_no_retries_once_cancelled() {
        let mut ingestor = MockTrackIngestor::new();
        ingestor
            .expect_ingest()
            .times(1)
            .returning(|_| Err(locked()));

        let (_queue, worker) =
            IngestWorker::new(Arc::new(ingestor), Arc::new(StreamMetrics::new()), &config(4));
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(worker.process(&message("a.mp3"), &cancel).await, "failed");
    }

    #[tokio::test]
    async fn test_worker_moves_on_after_dropping_a_message() {
        let mut ingestor = MockTrackIngestor::new();
        ingestor
            .expect_ingest()
            .withf(|m| m.file_path.as_deref() == Some("bad.mp3"))
            .times(3)
            .returning(|_| Err(locked()));
        ingestor
            .expect_ingest()
            .withf(|m| m.file_path.as_deref() == Some("good.mp3"))
            .times(1)
            .returning(|_| Ok(ingested()));

        let (queue, worker) =
            IngestWorker::new(Arc::new(ingestor), Arc::new(StreamMetrics::new()), &config(4));
        let handle = worker.spawn(CancellationToken::new());

        queue.enqueue(message("bad.mp3")).unwrap();
        queue.enqueue(message("good.mp3")).unwrap();
        drop(queue);
        handle.await.unwrap();
    }
}
