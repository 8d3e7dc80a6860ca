use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use uuid::Uuid;

const SEARCH_DURATION_BUCKETS: [f64; 7] = [0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

/// Instruments for the streaming, search and ingestion paths.
///
/// Values are exported through the global meter provider when OTLP export is
/// enabled. The active-connection gauge is also kept locally so it can be read
/// back.
pub struct StreamMetrics {
    active: Mutex<HashMap<Uuid, Arc<AtomicI64>>>,
    connections_active: UpDownCounter<i64>,
    bytes_sent: Counter<u64>,
    playback_started: Counter<u64>,
    playback_events: Counter<u64>,
    ingest_messages: Counter<u64>,
    search_queries: Counter<u64>,
    search_results: Counter<u64>,
    search_duration: Histogram<f64>,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::with_meter(&opentelemetry::global::meter("radio-streaming"))
    }

    pub fn with_meter(meter: &Meter) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            connections_active: meter
                .i64_up_down_counter("streaming_connections_active")
                .with_description("Number of active streaming connections")
                .build(),
            bytes_sent: meter
                .u64_counter("streaming_bytes_sent_total")
                .with_description("Total bytes sent for streaming")
                .build(),
            playback_started: meter
                .u64_counter("playback_started_total")
                .with_description("Total number of playback sessions started")
                .build(),
            playback_events: meter
                .u64_counter("playback_events_total")
                .with_description("Total number of playback events received")
                .build(),
            ingest_messages: meter
                .u64_counter("ingest_messages_total")
                .with_description("Track downloaded notifications by outcome")
                .build(),
            search_queries: meter
                .u64_counter("search_queries_total")
                .with_description("Total number of search queries")
                .build(),
            search_results: meter
                .u64_counter("search_results_total")
                .with_description("Total number of search results returned")
                .build(),
            search_duration: meter
                .f64_histogram("search_duration_seconds")
                .with_description("Time spent processing search queries")
                .with_unit("s")
                .with_boundaries(SEARCH_DURATION_BUCKETS.to_vec())
                .build(),
        }
    }

    /// Count a new connection for `station_id`. The count is released when
    /// the returned guard is dropped.
    pub fn connection_opened(self: &Arc<Self>, station_id: Uuid) -> ConnectionGuard {
        let counter = {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.entry(station_id).or_default().clone()
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.connections_active
            .add(1, &[KeyValue::new("station_id", station_id.to_string())]);

        ConnectionGuard {
            metrics: Arc::clone(self),
            station_id,
            counter,
        }
    }

    pub fn active_connections(&self, station_id: Uuid) -> i64 {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active
            .get(&station_id)
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }

    pub fn record_bytes_sent(&self, station_id: Uuid, track_id: Uuid, bytes: u64) {
        self.bytes_sent.add(
            bytes,
            &[
                KeyValue::new("station_id", station_id.to_string()),
                KeyValue::new("track_id", track_id.to_string()),
            ],
        );
    }

    pub fn record_playback_started(&self, station_id: Uuid, track_id: Uuid) {
        self.playback_started.add(
            1,
            &[
                KeyValue::new("station_id", station_id.to_string()),
                KeyValue::new("track_id", track_id.to_string()),
            ],
        );
    }

    pub fn record_playback_event(&self, station_id: Uuid, track_id: Uuid) {
        self.playback_events.add(
            1,
            &[
                KeyValue::new("station_id", station_id.to_string()),
                KeyValue::new("track_id", track_id.to_string()),
            ],
        );
    }

    pub fn record_ingest(&self, outcome: &'static str) {
        self.ingest_messages
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn record_search(&self, artists: usize, tracks: usize, elapsed: Duration) {
        self.search_queries
            .add(1, &[KeyValue::new("query_type", "combined")]);
        self.search_results
            .add(artists as u64, &[KeyValue::new("result_type", "artists")]);
        self.search_results
            .add(tracks as u64, &[KeyValue::new("result_type", "tracks")]);
        self.search_duration.record(elapsed.as_secs_f64(), &[]);
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds one active streaming connection open in [`StreamMetrics`].
pub struct ConnectionGuard {
    metrics: Arc<StreamMetrics>,
    station_id: Uuid,
    counter: Arc<AtomicI64>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.metrics
            .connections_active
            .add(-1, &[KeyValue::new("station_id", self.station_id.to_string())]);
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("station_id", &self.station_id)
            .finish()
    }
}
