use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::entities;
use crate::entities::radio_station::StationType;
use crate::http_server::error::ApiError;
use crate::http_server::state::AppState;
use crate::services::station::StationFilter;
use crate::services::track::StationTrackEntry;

#[derive(Debug, Serialize)]
pub struct StationResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub station_type: StationType,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entities::radio_station::Model> for StationResponse {
    fn from(station: entities::radio_station::Model) -> Self {
        Self {
            id: station.id,
            name: station.name,
            station_type: station.station_type,
            genre: station.genre,
            description: station.description,
            is_active: station.is_active,
            created_at: station.created_at,
            updated_at: station.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub id: Uuid,
    pub title: String,
    pub artist_id: Uuid,
    pub artist_name: Option<String>,
    pub duration_seconds: i32,
    pub file_path: String,
    pub file_size: i64,
    pub file_format: String,
}

impl TrackResponse {
    pub fn new(track: entities::track::Model, artist_name: Option<String>) -> Self {
        Self {
            id: track.id,
            title: track.title,
            artist_id: track.artist_id,
            artist_name,
            duration_seconds: track.duration_seconds,
            file_path: track.file_path,
            file_size: track.file_size,
            file_format: track.file_format,
        }
    }
}

pub async fn list_stations(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StationFilter>,
) -> Result<Json<Vec<StationResponse>>, ApiError> {
    let stations = state.stations.list_stations(&filter).await?;
    Ok(Json(stations.into_iter().map(StationResponse::from).collect()))
}

pub async fn get_station(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<Uuid>,
) -> Result<Json<StationResponse>, ApiError> {
    let station = state
        .stations
        .get_station(station_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Station {station_id} not found")))?;
    Ok(Json(station.into()))
}

pub async fn station_tracks(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<Uuid>,
) -> Result<Json<Vec<TrackResponse>>, ApiError> {
    if state.stations.get_station(station_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Station {station_id} not found")));
    }

    let entries = state.tracks.list_station_tracks(station_id).await?;
    tracing::debug!(%station_id, count = entries.len(), "Listed station tracks");

    Ok(Json(
        entries
            .into_iter()
            .map(|StationTrackEntry { track, artist_name, .. }| TrackResponse::new(track, artist_name))
            .collect(),
    ))
}
