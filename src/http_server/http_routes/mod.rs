pub mod health;
pub mod ingest_feed;
pub mod playback;
pub mod search;
pub mod stations;
pub mod stream;
