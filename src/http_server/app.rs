use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use color_eyre::eyre::{Context, eyre};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{
    config::Config,
    database::Database,
    http_server::{http_routes, state::AppState},
    services::{
        events::{self, EventProducer},
        ingest::{IngestService, IngestWorker},
        metrics::StreamMetrics,
        object_store,
        search::SearchService,
        station::StationService,
        streaming::StreamService,
        track::TrackService,
    },
};

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http_routes::health::health))
        .route(
            "/stream/station/{station_id}",
            get(http_routes::stream::stream_station),
        )
        .route(
            "/stream/track/{track_id}",
            get(http_routes::stream::stream_track),
        )
        .route("/stations", get(http_routes::stations::list_stations))
        .route(
            "/stations/{station_id}",
            get(http_routes::stations::get_station),
        )
        .route(
            "/stations/{station_id}/tracks",
            get(http_routes::stations::station_tracks),
        )
        .route("/search", get(http_routes::search::search))
        .route(
            "/playback/events",
            post(http_routes::playback::create_playback_event),
        )
        .route(
            "/events/music-downloaded",
            post(http_routes::ingest_feed::music_downloaded),
        )
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

/// Serve until SIGINT/SIGTERM, then stop the ingest worker and flush pending
/// events.
pub async fn start(port: u16, database: Database, config: Config) -> color_eyre::Result<()> {
    let db = Arc::new(database);
    let metrics = Arc::new(StreamMetrics::new());

    let store = object_store::from_config(&config.object_store())?;
    let sink = events::publisher_from_config(&config.events)?;
    let producer = Arc::new(EventProducer::start(sink, config.events.queue_capacity));

    let ingest = Arc::new(IngestService::new(db.clone(), config.tenant_id));
    let (ingest_queue, worker) = IngestWorker::new(ingest, metrics.clone(), &config.ingest);
    let worker_cancel = CancellationToken::new();
    let worker_handle = worker.spawn(worker_cancel.clone());

    let app_state = Arc::new(AppState {
        db: db.clone(),
        streams: StreamService::new(
            db.clone(),
            store,
            producer.clone(),
            metrics.clone(),
            config.fetch_timeout(),
        ),
        stations: StationService::new(db.clone()),
        tracks: TrackService::new(db.clone()),
        search: SearchService::new(db.clone(), metrics.clone()),
        ingest_queue,
        producer: producer.clone(),
        metrics,
    });

    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .wrap_err_with(|| eyre!("Failed to bind to port {}", port))?;
    tracing::info!(port, "HTTP server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("HTTP server failed");

    tracing::info!("HTTP server stopped, shutting down background tasks");

    worker_cancel.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Ingest worker panicked");
    }
    producer.shutdown().await;

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
