//! Turns "track downloaded" notifications into catalog rows.
//!
//! A notification is applied in a single transaction: the artist is found or
//! created, a track is created for the storage key, and the track is appended
//! to every active station that should carry it. Notifications are delivered
//! at least once, so a storage key that is already in the catalog turns the
//! whole notification into a no-op.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use worker::{EnqueueError, IngestQueue, IngestWorker};

use crate::database::{Database, is_unique_violation};
use crate::entities;
use crate::entities::radio_station::StationType;
use crate::services::station::link_track;

const UNKNOWN_TITLE: &str = "Unknown Track";
const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_SOURCE: &str = "unknown";
const FALLBACK_FORMAT: &str = "mp3";

const KNOWN_FORMATS: [&str; 7] = ["m4a", "opus", "webm", "flac", "ogg", "wav", "mp3"];

/// Inbound notification published by the downloader once a file is in the
/// object store. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackDownloaded {
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Seconds, fractional values are rounded
    pub duration: Option<f64>,
    pub file_size: Option<i64>,
    pub source: Option<String>,
    pub context: Option<DownloadContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadContext {
    pub concert_id: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A notification with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDownload {
    pub file_path: String,
    pub title: String,
    pub artist: String,
    pub duration_seconds: i32,
    pub file_size: i64,
    pub file_format: &'static str,
    pub source: String,
    pub source_url: Option<String>,
    /// The download belongs to a concert (a non-empty `context.concert_id`)
    pub has_concert: bool,
}

impl TrackDownloaded {
    /// `None` when there is no storage key to catalog.
    pub fn validate(&self) -> Option<ValidatedDownload> {
        let file_path = non_blank(&self.file_path)?;

        let duration_seconds = self
            .duration
            .filter(|d| d.is_finite())
            .map_or(0, |d| d.round().clamp(0.0, f64::from(i32::MAX)) as i32);

        Some(ValidatedDownload {
            file_path: file_path.to_string(),
            title: non_blank(&self.title).unwrap_or(UNKNOWN_TITLE).to_string(),
            artist: non_blank(&self.artist).unwrap_or(UNKNOWN_ARTIST).to_string(),
            duration_seconds,
            file_size: self.file_size.unwrap_or(0).max(0),
            file_format: format_from_path(file_path),
            source: non_blank(&self.source).unwrap_or(UNKNOWN_SOURCE).to_string(),
            source_url: non_blank(&self.url).map(str::to_string),
            has_concert: self
                .context
                .as_ref()
                .and_then(|context| context.concert_id.as_ref())
                .is_some_and(is_present),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Audio format tag derived from the storage key's extension.
pub fn format_from_path(file_path: &str) -> &'static str {
    let Some((_, extension)) = file_path.rsplit_once('.') else {
        return FALLBACK_FORMAT;
    };
    KNOWN_FORMATS
        .into_iter()
        .find(|format| extension.eq_ignore_ascii_case(format))
        .unwrap_or(FALLBACK_FORMAT)
}

/// Whether a download should be appended to a station of the given type.
pub fn should_link(station_type: StationType, download: &ValidatedDownload) -> bool {
    match station_type {
        StationType::Upcoming => download.has_concert,
        StationType::Past => true,
        // No genre information travels with a download
        StationType::Genre => true,
    }
}

/// Decides which existing artist a downloaded track belongs to.
pub trait ArtistNameMatcher: Send + Sync {
    fn condition(&self, name: &str) -> Condition;
}

/// Artists match on their exact display name.
pub struct ExactName;

impl ArtistNameMatcher for ExactName {
    fn condition(&self, name: &str) -> Condition {
        Condition::all().add(entities::artist::Column::Name.eq(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Nothing to catalog
    Skipped,
    /// The storage key was already in the catalog
    AlreadyIngested,
    Ingested {
        track_id: Uuid,
        artist_id: Uuid,
        linked_stations: usize,
    },
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Skipped => "skipped",
            IngestOutcome::AlreadyIngested => "duplicate",
            IngestOutcome::Ingested { .. } => "ingested",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("A track is already stored at {file_path}")]
    DuplicateKey { file_path: String },

    #[error("Catalog error: {0}")]
    Database(#[from] DbErr),

    #[error("Ingest transaction did not finish within {0:?}")]
    Timeout(Duration),
}

/// Applies one notification to the catalog. The worker only sees this seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TrackIngestor: Send + Sync {
    async fn ingest(&self, message: &TrackDownloaded) -> Result<IngestOutcome, IngestError>;
}

#[async_trait::async_trait]
impl TrackIngestor for IngestService {
    async fn ingest(&self, message: &TrackDownloaded) -> Result<IngestOutcome, IngestError> {
        IngestService::ingest(self, message).await
    }
}

pub struct IngestService {
    db: Arc<Database>,
    tenant_id: Uuid,
    matcher: Box<dyn ArtistNameMatcher>,
}

impl IngestService {
    pub fn new(db: Arc<Database>, tenant_id: Uuid) -> Self {
        Self::with_matcher(db, tenant_id, Box::new(ExactName))
    }

    pub fn with_matcher(
        db: Arc<Database>,
        tenant_id: Uuid,
        matcher: Box<dyn ArtistNameMatcher>,
    ) -> Self {
        Self {
            db,
            tenant_id,
            matcher,
        }
    }

    pub async fn ingest(&self, message: &TrackDownloaded) -> Result<IngestOutcome, IngestError> {
        let Some(download) = message.validate() else {
            tracing::warn!(url = ?message.url, "Download notification has no file path, skipping");
            return Ok(IngestOutcome::Skipped);
        };

        tracing::info!(
            file_path = %download.file_path,
            title = %download.title,
            artist = %download.artist,
            source = %download.source,
            "Ingesting downloaded track"
        );

        let txn = self.db.conn.begin().await?;

        match self.apply(&txn, &download).await {
            Ok(outcome) => match txn.commit().await {
                Ok(()) => {
                    tracing::info!(file_path = %download.file_path, ?outcome, "Track ingested");
                    Ok(outcome)
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::info!(file_path = %download.file_path, "Track already ingested");
                    Ok(IngestOutcome::AlreadyIngested)
                }
                Err(e) => Err(e.into()),
            },
            Err(IngestError::DuplicateKey { file_path }) => {
                txn.rollback().await?;
                tracing::info!(%file_path, "Track already ingested");
                Ok(IngestOutcome::AlreadyIngested)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::error!(error = %rollback, "Failed to roll back ingest transaction");
                }
                tracing::error!(file_path = %download.file_path, error = %e, "Ingest failed");
                Err(e)
            }
        }
    }

    async fn apply<C>(&self, conn: &C, download: &ValidatedDownload) -> Result<IngestOutcome, IngestError>
    where
        C: ConnectionTrait,
    {
        let artist = self.find_or_create_artist(conn, &download.artist).await?;
        let track = self.create_track(conn, artist.id, download).await?;

        let stations = entities::radio_station::Entity::find()
            .filter(entities::radio_station::Column::IsActive.eq(true))
            .order_by_asc(entities::radio_station::Column::Name)
            .all(conn)
            .await?;

        let mut linked_stations = 0;
        for station in stations {
            if !should_link(station.station_type, download) {
                continue;
            }
            if let Some(order) = link_track(conn, station.id, track.id).await? {
                linked_stations += 1;
                tracing::info!(
                    track_id = %track.id,
                    station_id = %station.id,
                    station = %station.name,
                    order,
                    "Track linked to station"
                );
            }
        }

        Ok(IngestOutcome::Ingested {
            track_id: track.id,
            artist_id: artist.id,
            linked_stations,
        })
    }

    async fn find_or_create_artist<C>(
        &self,
        conn: &C,
        name: &str,
    ) -> Result<entities::artist::Model, IngestError>
    where
        C: ConnectionTrait,
    {
        let existing = entities::artist::Entity::find()
            .filter(entities::artist::Column::TenantId.eq(self.tenant_id))
            .filter(self.matcher.condition(name))
            .order_by_asc(entities::artist::Column::CreatedAt)
            .one(conn)
            .await?;

        if let Some(artist) = existing {
            return Ok(artist);
        }

        let artist = entities::artist::ActiveModel {
            tenant_id: Set(self.tenant_id),
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        tracing::info!(artist_id = %artist.id, name, "Artist created");
        Ok(artist)
    }

    async fn create_track<C>(
        &self,
        conn: &C,
        artist_id: Uuid,
        download: &ValidatedDownload,
    ) -> Result<entities::track::Model, IngestError>
    where
        C: ConnectionTrait,
    {
        entities::track::ActiveModel {
            tenant_id: Set(self.tenant_id),
            artist_id: Set(artist_id),
            title: Set(download.title.clone()),
            duration_seconds: Set(download.duration_seconds),
            file_path: Set(download.file_path.clone()),
            file_size: Set(download.file_size),
            file_format: Set(download.file_format.to_string()),
            source_url: Set(download.source_url.clone()),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                IngestError::DuplicateKey {
                    file_path: download.file_path.clone(),
                }
            } else {
                IngestError::Database(e)
            }
        })
    }
}
