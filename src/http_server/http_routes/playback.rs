use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http_server::state::AppState;
use crate::services::events::PlaybackEvent;

#[derive(Debug, Deserialize)]
pub struct PlaybackEventRequest {
    pub station_id: Uuid,
    pub track_id: Uuid,
    pub duration_seconds: Option<i32>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaybackEventResponse {
    pub id: Uuid,
    pub station_id: Uuid,
    pub track_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: Option<i32>,
}

/// Record a client-reported playback. Delivery to the event sink is best
/// effort and never fails the request.
pub async fn create_playback_event(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaybackEventRequest>,
) -> (StatusCode, Json<PlaybackEventResponse>) {
    let mut event = PlaybackEvent::new(request.station_id, request.track_id, request.duration_seconds);
    event.user_id = request.user_id;

    state
        .metrics
        .record_playback_event(event.station_id, event.track_id);
    state.producer.publish_playback(&event);

    let id = Uuid::new_v4();
    tracing::info!(
        event_id = %id,
        station_id = %event.station_id,
        track_id = %event.track_id,
        duration_seconds = ?event.duration_seconds,
        "Playback event received"
    );

    (
        StatusCode::CREATED,
        Json(PlaybackEventResponse {
            id,
            station_id: event.station_id,
            track_id: event.track_id,
            timestamp: event.timestamp,
            duration_seconds: event.duration_seconds,
        }),
    )
}
