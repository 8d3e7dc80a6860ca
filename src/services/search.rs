use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use color_eyre::eyre::{Result, WrapErr};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::database::Database;
use crate::entities;
use crate::services::metrics::StreamMetrics;

pub const DEFAULT_SEARCH_LIMIT: u64 = 50;
pub const MAX_SEARCH_LIMIT: u64 = 100;

#[derive(Debug, Clone)]
pub struct ArtistHit {
    pub artist: entities::artist::Model,
    pub track_count: usize,
}

#[derive(Debug, Clone)]
pub struct TrackHit {
    pub track: entities::track::Model,
    pub artist_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub artists: Vec<ArtistHit>,
    pub tracks: Vec<TrackHit>,
}

impl SearchResults {
    pub fn total(&self) -> usize {
        self.artists.len() + self.tracks.len()
    }
}

/// Substring search over artist names and track titles.
///
/// Matching uses SQL `LIKE`, which SQLite compares case-insensitively for
/// ASCII text.
pub struct SearchService {
    db: Arc<Database>,
    metrics: Arc<StreamMetrics>,
}

impl SearchService {
    pub fn new(db: Arc<Database>, metrics: Arc<StreamMetrics>) -> Self {
        Self { db, metrics }
    }

    /// `limit` applies to artists and tracks separately.
    pub async fn search(&self, query: &str, limit: u64) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            tracing::debug!("Empty search query");
            return Ok(SearchResults::default());
        }
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        let started = Instant::now();

        let artists = self.search_artists(query, limit).await?;
        let tracks = self.search_tracks(query, limit).await?;

        let results = SearchResults { artists, tracks };
        let elapsed = started.elapsed();
        self.metrics
            .record_search(results.artists.len(), results.tracks.len(), elapsed);
        tracing::info!(
            query,
            artists = results.artists.len(),
            tracks = results.tracks.len(),
            duration_ms = elapsed.as_millis() as u64,
            "Search completed"
        );
        Ok(results)
    }

    async fn search_artists(&self, query: &str, limit: u64) -> Result<Vec<ArtistHit>> {
        let artists = entities::artist::Entity::find()
            .filter(entities::artist::Column::Name.contains(query))
            .order_by_asc(entities::artist::Column::Name)
            .limit(limit)
            .all(&self.db.conn)
            .await
            .wrap_err("Failed to search artists")?;

        if artists.is_empty() {
            return Ok(Vec::new());
        }

        let artist_ids: Vec<Uuid> = artists.iter().map(|artist| artist.id).collect();
        let mut track_counts: HashMap<Uuid, usize> = HashMap::new();
        for track in entities::track::Entity::find()
            .filter(entities::track::Column::ArtistId.is_in(artist_ids))
            .all(&self.db.conn)
            .await
            .wrap_err("Failed to count artist tracks")?
        {
            *track_counts.entry(track.artist_id).or_default() += 1;
        }

        Ok(artists
            .into_iter()
            .map(|artist| ArtistHit {
                track_count: track_counts.get(&artist.id).copied().unwrap_or(0),
                artist,
            })
            .collect())
    }

    async fn search_tracks(&self, query: &str, limit: u64) -> Result<Vec<TrackHit>> {
        let tracks = entities::track::Entity::find()
            .filter(entities::track::Column::Title.contains(query))
            .find_also_related(entities::artist::Entity)
            .order_by_asc(entities::track::Column::Title)
            .limit(limit)
            .all(&self.db.conn)
            .await
            .wrap_err("Failed to search tracks")?;

        Ok(tracks
            .into_iter()
            .map(|(track, artist)| TrackHit {
                track,
                artist_name: artist.map(|artist| artist.name),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_artist, insert_track, test_db};

    #[tokio::test]
    async fn test_search_matches_artists_and_tracks() {
        let db = test_db().await;
        let service = SearchService::new(db.clone(), Arc::new(StreamMetrics::new()));
        let moon = insert_artist(&db, "Moonlight Orchestra").await;
        let sun = insert_artist(&db, "Sun Choir").await;
        insert_track(&db, moon.id, "Overture", "overture.mp3", 10, "mp3").await;
        insert_track(&db, moon.id, "Finale", "finale.mp3", 10, "mp3").await;
        insert_track(&db, sun.id, "Blue Moon", "blue.mp3", 10, "mp3").await;

        let results = service.search("moon", DEFAULT_SEARCH_LIMIT).await.unwrap();

        assert_eq!(results.artists.len(), 1);
        assert_eq!(results.artists[0].artist.name, "Moonlight Orchestra");
        assert_eq!(results.artists[0].track_count, 2);

        assert_eq!(results.tracks.len(), 1);
        assert_eq!(results.tracks[0].track.title, "Blue Moon");
        assert_eq!(results.tracks[0].artist_name.as_deref(), Some("Sun Choir"));
        assert_eq!(results.total(), 2);
    }

    #[tokio::test]
    async fn test_search_ignores_ascii_case() {
        let db = test_db().await;
        let service = SearchService::new(db.clone(), Arc::new(StreamMetrics::new()));
        insert_artist(&db, "Moonlight Orchestra").await;

        let results = service.search("MOONLIGHT", DEFAULT_SEARCH_LIMIT).await.unwrap();
        assert_eq!(results.artists.len(), 1);
    }

    #[tokio::test]
    async fn test_limit_applies_per_kind() {
        let db = test_db().await;
        let service = SearchService::new(db.clone(), Arc::new(StreamMetrics::new()));
        let artist = insert_artist(&db, "Echo").await;
        for i in 0..5 {
            insert_track(&db, artist.id, &format!("Echo {i}"), &format!("echo{i}.mp3"), 10, "mp3")
                .await;
        }

        let results = service.search("echo", 3).await.unwrap();
        assert_eq!(results.artists.len(), 1);
        assert_eq!(results.tracks.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        let db = test_db().await;
        let service = SearchService::new(db.clone(), Arc::new(StreamMetrics::new()));
        insert_artist(&db, "Anyone").await;

        assert_eq!(service.search("   ", DEFAULT_SEARCH_LIMIT).await.unwrap().total(), 0);
    }
}
