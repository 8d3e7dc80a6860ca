use std::sync::Arc;

use color_eyre::eyre::{OptionExt, Result, WrapErr};
use sea_orm::sea_query::{Expr, ExprTrait, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::Database;
use crate::entities;
use crate::entities::radio_station::StationType;

#[derive(Debug, Clone, Deserialize)]
pub struct StationFilter {
    #[serde(default = "default_active_only")]
    pub active_only: bool,
    #[serde(rename = "type")]
    pub station_type: Option<StationType>,
    pub genre: Option<String>,
}

fn default_active_only() -> bool {
    true
}

impl Default for StationFilter {
    fn default() -> Self {
        Self {
            active_only: true,
            station_type: None,
            genre: None,
        }
    }
}

pub struct StationService {
    db: Arc<Database>,
}

impl StationService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// A type filter takes precedence over a genre filter; filtering by genre
    /// only returns genre stations.
    pub async fn list_stations(
        &self,
        filter: &StationFilter,
    ) -> Result<Vec<entities::radio_station::Model>> {
        let mut query = entities::radio_station::Entity::find();

        if filter.active_only {
            query = query.filter(entities::radio_station::Column::IsActive.eq(true));
        }

        if let Some(station_type) = filter.station_type {
            query = query.filter(entities::radio_station::Column::StationType.eq(station_type));
        } else if let Some(genre) = &filter.genre {
            query = query
                .filter(entities::radio_station::Column::StationType.eq(StationType::Genre))
                .filter(entities::radio_station::Column::Genre.eq(genre.as_str()));
        }

        let stations = query
            .order_by_asc(entities::radio_station::Column::Name)
            .all(&self.db.conn)
            .await
            .wrap_err("Failed to fetch stations")?;

        tracing::debug!(count = stations.len(), "Retrieved stations");
        Ok(stations)
    }

    pub async fn get_station(
        &self,
        station_id: Uuid,
    ) -> Result<Option<entities::radio_station::Model>> {
        entities::radio_station::Entity::find_by_id(station_id)
            .one(&self.db.conn)
            .await
            .wrap_err("Failed to fetch station")
    }

    pub async fn create_station(
        &self,
        name: String,
        station_type: StationType,
        genre: Option<String>,
        description: Option<String>,
    ) -> Result<entities::radio_station::Model> {
        let station = entities::radio_station::ActiveModel {
            name: Set(name),
            station_type: Set(station_type),
            genre: Set(genre),
            description: Set(description),
            ..Default::default()
        };

        let model = station
            .insert(&self.db.conn)
            .await
            .wrap_err("Failed to create station")?;

        tracing::info!(station_id = %model.id, name = %model.name, "Station created");
        Ok(model)
    }

    pub async fn set_active(
        &self,
        station_id: Uuid,
        is_active: bool,
    ) -> Result<entities::radio_station::Model> {
        let station = self
            .get_station(station_id)
            .await?
            .ok_or_eyre("Station not found")?;

        let mut active: entities::radio_station::ActiveModel = station.into();
        active.is_active = Set(is_active);
        let station = active
            .update(&self.db.conn)
            .await
            .wrap_err("Failed to update station")?;
        tracing::info!(station_id = %station.id, is_active, "Station availability changed");
        Ok(station)
    }

    /// The station's current track: the first one in playlist order.
    pub async fn first_track(&self, station_id: Uuid) -> Result<Option<entities::track::Model>> {
        let Some(link) = entities::station_track::Entity::find()
            .filter(entities::station_track::Column::StationId.eq(station_id))
            .order_by_asc(entities::station_track::Column::Order)
            .one(&self.db.conn)
            .await
            .wrap_err("Failed to fetch station playlist")?
        else {
            return Ok(None);
        };

        entities::track::Entity::find_by_id(link.track_id)
            .one(&self.db.conn)
            .await
            .wrap_err("Failed to fetch station track")
    }
}

/// Append `track_id` to the station playlist at the station's next order.
///
/// Orders come from the station's `next_order` high-water mark, so a
/// position freed by a deleted link is never handed out again. Run it in
/// the caller's transaction when other writers may link concurrently.
///
/// Returns the assigned order, or `None` when the pair is already linked.
pub async fn link_track<C>(conn: &C, station_id: Uuid, track_id: Uuid) -> Result<Option<i32>, DbErr>
where
    C: ConnectionTrait,
{
    let already_linked = entities::station_track::Entity::find()
        .filter(entities::station_track::Column::StationId.eq(station_id))
        .filter(entities::station_track::Column::TrackId.eq(track_id))
        .one(conn)
        .await?
        .is_some();
    if already_linked {
        return Ok(None);
    }

    let station = entities::radio_station::Entity::find_by_id(station_id)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("Station {station_id}")))?;
    let order = station.next_order;

    let link = entities::station_track::ActiveModel {
        station_id: Set(station_id),
        track_id: Set(track_id),
        order: Set(order),
        ..Default::default()
    };

    let inserted = entities::station_track::Entity::insert(link)
        .on_conflict(
            OnConflict::columns([
                entities::station_track::Column::StationId,
                entities::station_track::Column::TrackId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    if inserted == 0 {
        return Ok(None);
    }

    entities::radio_station::Entity::update_many()
        .col_expr(
            entities::radio_station::Column::NextOrder,
            Expr::col(entities::radio_station::Column::NextOrder).add(1),
        )
        .filter(entities::radio_station::Column::Id.eq(station_id))
        .exec(conn)
        .await?;

    Ok(Some(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::is_unique_violation;
    use crate::test_utils::{insert_artist, insert_station, insert_track, test_db};
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_list_stations_filters() {
        let db = test_db().await;
        let service = StationService::new(db.clone());

        insert_station(&db, "Upcoming Bands", StationType::Upcoming, true).await;
        insert_station(&db, "Past Performers", StationType::Past, true).await;
        insert_station(&db, "Retired", StationType::Past, false).await;
        service
            .create_station(
                "Jazz".into(),
                StationType::Genre,
                Some("jazz".into()),
                None,
            )
            .await
            .unwrap();

        let active = service.list_stations(&StationFilter::default()).await.unwrap();
        assert_eq!(active.len(), 3);

        let all = service
            .list_stations(&StationFilter {
                active_only: false,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 4);

        let past = service
            .list_stations(&StationFilter {
                active_only: false,
                station_type: Some(StationType::Past),
                genre: None,
            })
            .await
            .unwrap();
        assert_eq!(past.len(), 2);

        let jazz = service
            .list_stations(&StationFilter {
                genre: Some("jazz".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(jazz.len(), 1);
        assert_eq!(jazz[0].name, "Jazz");
    }

    #[tokio::test]
    async fn test_link_track_appends_in_order() {
        let db = test_db().await;
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "Y").await;
        let t1 = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;
        let t2 = insert_track(&db, artist.id, "Two", "two.mp3", 10, "mp3").await;
        let t3 = insert_track(&db, artist.id, "Three", "three.mp3", 10, "mp3").await;

        assert_eq!(link_track(&db.conn, station.id, t1.id).await.unwrap(), Some(1));
        assert_eq!(link_track(&db.conn, station.id, t2.id).await.unwrap(), Some(2));
        assert_eq!(link_track(&db.conn, station.id, t3.id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_link_track_twice_does_not_duplicate() {
        let db = test_db().await;
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "Y").await;
        let track = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;

        assert_eq!(link_track(&db.conn, station.id, track.id).await.unwrap(), Some(1));
        assert_eq!(link_track(&db.conn, station.id, track.id).await.unwrap(), None);

        let links = entities::station_track::Entity::find()
            .filter(entities::station_track::Column::StationId.eq(station.id))
            .count(&db.conn)
            .await
            .unwrap();
        assert_eq!(links, 1);
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_rejected_by_constraint() {
        let db = test_db().await;
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "Y").await;
        let track = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;

        link_track(&db.conn, station.id, track.id).await.unwrap();

        let duplicate = entities::station_track::ActiveModel {
            station_id: Set(station.id),
            track_id: Set(track.id),
            order: Set(99),
            ..Default::default()
        }
        .insert(&db.conn)
        .await;

        let err = duplicate.unwrap_err();
        assert!(is_unique_violation(&err), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_order_is_not_reused_after_removal() {
        let db = test_db().await;
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "Y").await;
        let t1 = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;
        let t2 = insert_track(&db, artist.id, "Two", "two.mp3", 10, "mp3").await;
        let t3 = insert_track(&db, artist.id, "Three", "three.mp3", 10, "mp3").await;
        let t4 = insert_track(&db, artist.id, "Four", "four.mp3", 10, "mp3").await;

        assert_eq!(link_track(&db.conn, station.id, t1.id).await.unwrap(), Some(1));
        assert_eq!(link_track(&db.conn, station.id, t2.id).await.unwrap(), Some(2));

        // Removing the tail link must not hand its order out again
        entities::track::Entity::delete_by_id(t2.id)
            .exec(&db.conn)
            .await
            .unwrap();
        assert_eq!(link_track(&db.conn, station.id, t3.id).await.unwrap(), Some(3));

        entities::track::Entity::delete_by_id(t1.id)
            .exec(&db.conn)
            .await
            .unwrap();
        assert_eq!(link_track(&db.conn, station.id, t4.id).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_duplicate_link_does_not_consume_an_order() {
        let db = test_db().await;
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "Y").await;
        let t1 = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;
        let t2 = insert_track(&db, artist.id, "Two", "two.mp3", 10, "mp3").await;

        link_track(&db.conn, station.id, t1.id).await.unwrap();
        assert_eq!(link_track(&db.conn, station.id, t1.id).await.unwrap(), None);
        assert_eq!(link_track(&db.conn, station.id, t2.id).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_link_to_unknown_station_fails() {
        let db = test_db().await;
        let artist = insert_artist(&db, "Y").await;
        let track = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;

        let err = link_track(&db.conn, Uuid::new_v4(), track.id).await.unwrap_err();
        assert!(matches!(err, DbErr::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn test_first_track_follows_playlist_order() {
        let db = test_db().await;
        let service = StationService::new(db.clone());
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;
        let artist = insert_artist(&db, "Y").await;
        let t1 = insert_track(&db, artist.id, "One", "one.mp3", 10, "mp3").await;
        let t2 = insert_track(&db, artist.id, "Two", "two.mp3", 10, "mp3").await;

        assert!(service.first_track(station.id).await.unwrap().is_none());

        link_track(&db.conn, station.id, t2.id).await.unwrap();
        link_track(&db.conn, station.id, t1.id).await.unwrap();

        let first = service.first_track(station.id).await.unwrap().unwrap();
        assert_eq!(first.id, t2.id);
    }

    #[tokio::test]
    async fn test_set_active() {
        let db = test_db().await;
        let service = StationService::new(db.clone());
        let station = insert_station(&db, "Past Performers", StationType::Past, true).await;

        let updated = service.set_active(station.id, false).await.unwrap();
        assert!(!updated.is_active);
        assert!(service.set_active(Uuid::new_v4(), true).await.is_err());
    }
}
