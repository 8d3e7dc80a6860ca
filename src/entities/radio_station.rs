use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set};
use serde::{Deserialize, Serialize};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum StationType {
    /// Music from upcoming performers
    #[sea_orm(string_value = "upcoming")]
    Upcoming,
    /// Music from past performers
    #[sea_orm(string_value = "past")]
    Past,
    #[sea_orm(string_value = "genre")]
    Genre,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "radio_stations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_name = "type")]
    pub station_type: StationType,
    /// Only meaningful for genre stations
    pub genre: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    /// Playlist position handed to the next linked track
    pub next_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::station_track::Entity")]
    StationTrack,
}

impl Related<super::station_track::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StationTrack.def()
    }
}

impl Related<super::track::Entity> for Entity {
    fn to() -> RelationDef {
        super::station_track::Relation::Track.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::station_track::Relation::RadioStation.def().rev())
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Set(Uuid::new_v4()),
            is_active: Set(true),
            next_order: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = Set(Utc::now());
        }
        Ok(self)
    }
}
