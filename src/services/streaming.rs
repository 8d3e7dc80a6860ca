//! Byte-range audio delivery from the object store.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use color_eyre::eyre::eyre;
use uuid::Uuid;

use crate::database::Database;
use crate::entities;
use crate::ports::object_store::ObjectStore;
use crate::services::events::{EventProducer, PlaybackEvent};
use crate::services::metrics::{ConnectionGuard, StreamMetrics};
use crate::services::range::{self, RangeError, ResolvedRange};
use crate::services::station::StationService;
use crate::services::track::TrackService;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Track {0} not found")]
    TrackNotFound(Uuid),

    #[error("Station {0} not found")]
    StationNotFound(Uuid),

    #[error("Station {0} is not active")]
    StationInactive(Uuid),

    #[error("Station {0} has no tracks")]
    StationEmpty(Uuid),

    #[error("Audio file not found: {key}")]
    ObjectMissing { key: String },

    #[error("Requested range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },

    #[error("{0:#}")]
    Internal(color_eyre::Report),
}

impl From<color_eyre::Report> for StreamError {
    fn from(err: color_eyre::Report) -> Self {
        Self::Internal(err)
    }
}

/// Bytes and metadata for one successful delivery.
#[derive(Debug)]
pub struct StreamResponse {
    pub range: ResolvedRange,
    pub content_type: String,
    pub body: Bytes,
    /// Keeps the station's connection counted until the body is gone
    pub guard: Option<ConnectionGuard>,
}

pub struct StreamService {
    stations: StationService,
    tracks: TrackService,
    store: Arc<dyn ObjectStore>,
    producer: Arc<EventProducer>,
    metrics: Arc<StreamMetrics>,
    fetch_timeout: Duration,
}

impl StreamService {
    pub fn new(
        db: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        producer: Arc<EventProducer>,
        metrics: Arc<StreamMetrics>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            stations: StationService::new(db.clone()),
            tracks: TrackService::new(db),
            store,
            producer,
            metrics,
            fetch_timeout,
        }
    }

    pub async fn deliver_track(
        &self,
        track_id: Uuid,
        range_header: Option<&str>,
    ) -> Result<StreamResponse, StreamError> {
        let track = self
            .tracks
            .get_track(track_id)
            .await?
            .ok_or(StreamError::TrackNotFound(track_id))?;

        self.serve(&track, range_header).await
    }

    /// Stream the station's current track.
    ///
    /// The station's connection gauge is raised for the duration of the
    /// delivery and, on success, until the returned response is dropped.
    pub async fn deliver_station(
        &self,
        station_id: Uuid,
        range_header: Option<&str>,
    ) -> Result<StreamResponse, StreamError> {
        let station = self
            .stations
            .get_station(station_id)
            .await?
            .ok_or(StreamError::StationNotFound(station_id))?;
        if !station.is_active {
            return Err(StreamError::StationInactive(station_id));
        }

        let track = self
            .stations
            .first_track(station_id)
            .await?
            .ok_or(StreamError::StationEmpty(station_id))?;

        let guard = self.metrics.connection_opened(station_id);
        let mut response = self.serve(&track, range_header).await?;

        self.metrics.record_playback_started(station_id, track.id);
        self.metrics
            .record_bytes_sent(station_id, track.id, response.range.content_length());
        self.producer
            .publish_playback(&PlaybackEvent::new(station_id, track.id, None));

        tracing::info!(
            %station_id,
            track_id = %track.id,
            partial = response.range.is_partial(),
            bytes = response.range.content_length(),
            connections = self.metrics.active_connections(station_id),
            "Streaming station"
        );

        response.guard = Some(guard);
        Ok(response)
    }

    async fn serve(
        &self,
        track: &entities::track::Model,
        range_header: Option<&str>,
    ) -> Result<StreamResponse, StreamError> {
        let key = track.file_path.as_str();

        if !self.store.exists(key).await? {
            tracing::warn!(track_id = %track.id, key, "Audio object missing from store");
            return Err(StreamError::ObjectMissing {
                key: key.to_string(),
            });
        }

        let size = self.object_size(track).await?;

        let range = match range::resolve(range_header, size) {
            Ok(range) => range,
            Err(RangeError::Malformed(header)) => {
                tracing::debug!(header, "Ignoring malformed range header");
                ResolvedRange::Full { length: size }
            }
            Err(e @ RangeError::Unsatisfiable { .. }) => {
                tracing::debug!(track_id = %track.id, error = %e, "Unsatisfiable range");
                return Err(StreamError::RangeNotSatisfiable { size });
            }
        };

        let fetch = async {
            match range {
                ResolvedRange::Full { .. } => self.store.get(key).await,
                ResolvedRange::Partial { start, end, .. } => {
                    self.store.get_range(key, start, end).await
                }
            }
        };
        let body = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| eyre!("Fetching {key} timed out after {:?}", self.fetch_timeout))??;

        let received = body.len() as u64;
        let range = match range {
            ResolvedRange::Full { length } if received != length => {
                // The object changed between the size lookup and the read
                tracing::warn!(
                    track_id = %track.id,
                    key,
                    expected = length,
                    received,
                    "Object size changed while streaming, serving what was read"
                );
                ResolvedRange::Full { length: received }
            }
            ResolvedRange::Partial { .. } if received != range.content_length() => {
                return Err(eyre!(
                    "Object {key} returned {received} bytes, expected {}",
                    range.content_length()
                )
                .into());
            }
            range => range,
        };

        Ok(StreamResponse {
            range,
            content_type: format!("audio/{}", track.file_format),
            body,
            guard: None,
        })
    }

    /// Size of the stored object. The catalog's recorded size is only
    /// compared against it so drift shows up in the logs.
    async fn object_size(&self, track: &entities::track::Model) -> Result<u64, StreamError> {
        let size = self
            .store
            .size(&track.file_path)
            .await?
            .ok_or_else(|| StreamError::ObjectMissing {
                key: track.file_path.clone(),
            })?;

        if track.file_size > 0 && track.file_size as u64 != size {
            tracing::warn!(
                track_id = %track.id,
                key = %track.file_path,
                recorded = track.file_size,
                actual = size,
                "Recorded file size does not match the stored object"
            );
        }
        Ok(size)
    }
}
