use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::http_server::error::ApiError;
use crate::http_server::http_routes::stations::TrackResponse;
use crate::http_server::state::AppState;
use crate::services::search::DEFAULT_SEARCH_LIMIT;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    /// Per result kind
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ArtistResult {
    pub id: Uuid,
    pub name: String,
    pub genre: Option<String>,
    pub bio: Option<String>,
    pub track_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub artists: Vec<ArtistResult>,
    pub tracks: Vec<TrackResponse>,
    pub total_results: usize,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = state.search.search(&params.q, limit).await?;
    let total_results = results.total();

    Ok(Json(SearchResponse {
        query: params.q,
        artists: results
            .artists
            .into_iter()
            .map(|hit| ArtistResult {
                id: hit.artist.id,
                name: hit.artist.name,
                genre: hit.artist.genre,
                bio: hit.artist.bio,
                track_count: hit.track_count,
            })
            .collect(),
        tracks: results
            .tracks
            .into_iter()
            .map(|hit| TrackResponse::new(hit.track, hit.artist_name))
            .collect(),
        total_results,
    }))
}
