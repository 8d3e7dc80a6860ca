use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::http_server::error::ApiError;
use crate::http_server::state::AppState;
use crate::services::ingest::{EnqueueError, TrackDownloaded};

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub status: &'static str,
}

/// Push endpoint for the downloader's "track downloaded" notifications.
pub async fn music_downloaded(
    State(state): State<Arc<AppState>>,
    Json(message): Json<TrackDownloaded>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
    let file_path = message.file_path.clone();

    state.ingest_queue.enqueue(message).map_err(|e| {
        match e {
            EnqueueError::Full => {
                tracing::warn!(?file_path, "Ingest queue full, rejecting download notification")
            }
            EnqueueError::Closed => {
                tracing::warn!(?file_path, "Ingest worker stopped, rejecting download notification")
            }
        }
        ApiError::Unavailable(e.to_string())
    })?;

    tracing::debug!(?file_path, "Download notification queued");
    Ok((StatusCode::ACCEPTED, Json(Accepted { status: "queued" })))
}
