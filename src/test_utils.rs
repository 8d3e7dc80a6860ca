use std::sync::{Arc, Mutex};

use color_eyre::eyre::Result;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database as SeaDatabase, Set};
use uuid::Uuid;

use crate::database::{DEFAULT_TENANT_ID, Database};
use crate::entities;
use crate::entities::radio_station::StationType;
use crate::ports::event_publisher::{EventPublisher, OutboundEvent};

pub async fn test_db() -> Arc<Database> {
    // A single connection keeps every query on the same in-memory database
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = SeaDatabase::connect(opt).await.unwrap();

    let db = Database { conn };
    db.migrate().await.unwrap();
    Arc::new(db)
}

pub async fn insert_station(
    db: &Database,
    name: &str,
    station_type: StationType,
    is_active: bool,
) -> entities::radio_station::Model {
    entities::radio_station::ActiveModel {
        name: Set(name.to_string()),
        station_type: Set(station_type),
        is_active: Set(is_active),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

pub async fn insert_artist(db: &Database, name: &str) -> entities::artist::Model {
    entities::artist::ActiveModel {
        tenant_id: Set(DEFAULT_TENANT_ID),
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

pub async fn insert_track(
    db: &Database,
    artist_id: Uuid,
    title: &str,
    file_path: &str,
    file_size: i64,
    file_format: &str,
) -> entities::track::Model {
    entities::track::ActiveModel {
        tenant_id: Set(DEFAULT_TENANT_ID),
        artist_id: Set(artist_id),
        title: Set(title.to_string()),
        duration_seconds: Set(180),
        file_path: Set(file_path.to_string()),
        file_size: Set(file_size),
        file_format: Set(file_format.to_string()),
        source_url: Set(None),
        ..Default::default()
    }
    .insert(&db.conn)
    .await
    .unwrap()
}

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<OutboundEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &OutboundEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
