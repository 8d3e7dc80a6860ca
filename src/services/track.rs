use std::collections::HashMap;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::database::Database;
use crate::entities;

/// A track as listed on a station, with its playlist position.
#[derive(Debug, Clone)]
pub struct StationTrackEntry {
    pub order: i32,
    pub track: entities::track::Model,
    pub artist_name: Option<String>,
}

pub struct TrackService {
    db: Arc<Database>,
}

impl TrackService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn get_track(&self, track_id: Uuid) -> Result<Option<entities::track::Model>> {
        entities::track::Entity::find_by_id(track_id)
            .one(&self.db.conn)
            .await
            .wrap_err("Failed to fetch track")
    }

    /// Tracks of a station in playlist order.
    pub async fn list_station_tracks(&self, station_id: Uuid) -> Result<Vec<StationTrackEntry>> {
        let links = entities::station_track::Entity::find()
            .filter(entities::station_track::Column::StationId.eq(station_id))
            .order_by_asc(entities::station_track::Column::Order)
            .all(&self.db.conn)
            .await
            .wrap_err("Failed to fetch station playlist")?;

        if links.is_empty() {
            return Ok(Vec::new());
        }

        let track_ids: Vec<Uuid> = links.iter().map(|link| link.track_id).collect();
        let mut tracks: HashMap<Uuid, (entities::track::Model, Option<entities::artist::Model>)> =
            entities::track::Entity::find()
                .filter(entities::track::Column::Id.is_in(track_ids))
                .find_also_related(entities::artist::Entity)
                .all(&self.db.conn)
                .await
                .wrap_err("Failed to fetch station tracks")?
                .into_iter()
                .map(|(track, artist)| (track.id, (track, artist)))
                .collect();

        // Keep the playlist order from the links
        let entries = links
            .into_iter()
            .filter_map(|link| {
                tracks
                    .remove(&link.track_id)
                    .map(|(track, artist)| StationTrackEntry {
                        order: link.order,
                        track,
                        artist_name: artist.map(|artist| artist.name),
                    })
            })
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::radio_station::StationType;
    use crate::services::station::link_track;
    use crate::test_utils::{insert_artist, insert_station, insert_track, test_db};

    #[tokio::test]
    async fn test_list_station_tracks_in_playlist_order() {
        let db = test_db().await;
        let service = TrackService::new(db.clone());
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "The Band").await;
        let a = insert_track(&db, artist.id, "Alpha", "a.mp3", 10, "mp3").await;
        let b = insert_track(&db, artist.id, "Beta", "b.mp3", 10, "mp3").await;

        link_track(&db.conn, station.id, b.id).await.unwrap();
        link_track(&db.conn, station.id, a.id).await.unwrap();

        let entries = service.list_station_tracks(station.id).await.unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.track.title.as_str()).collect();
        assert_eq!(titles, ["Beta", "Alpha"]);
        assert_eq!(entries[0].order, 1);
        assert_eq!(entries[1].order, 2);
        assert_eq!(entries[0].artist_name.as_deref(), Some("The Band"));
    }

    #[tokio::test]
    async fn test_list_station_tracks_for_empty_station() {
        let db = test_db().await;
        let service = TrackService::new(db.clone());
        let station = insert_station(&db, "Upcoming Bands", StationType::Upcoming, true).await;

        assert!(service.list_station_tracks(station.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_track() {
        let db = test_db().await;
        let service = TrackService::new(db.clone());
        let artist = insert_artist(&db, "Y").await;
        let track = insert_track(&db, artist.id, "X", "x.mp3", 10, "mp3").await;

        assert_eq!(service.get_track(track.id).await.unwrap().unwrap().title, "X");
        assert!(service.get_track(Uuid::new_v4()).await.unwrap().is_none());
    }
}
