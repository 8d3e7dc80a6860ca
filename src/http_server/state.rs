use std::sync::Arc;

use crate::database::Database;
use crate::services::events::EventProducer;
use crate::services::ingest::IngestQueue;
use crate::services::metrics::StreamMetrics;
use crate::services::search::SearchService;
use crate::services::station::StationService;
use crate::services::streaming::StreamService;
use crate::services::track::TrackService;

pub struct AppState {
    pub db: Arc<Database>,
    pub streams: StreamService,
    pub stations: StationService,
    pub tracks: TrackService,
    pub search: SearchService,
    pub ingest_queue: IngestQueue,
    pub producer: Arc<EventProducer>,
    pub metrics: Arc<StreamMetrics>,
}
