pub mod events;
pub mod ingest;
pub mod metrics;
pub mod object_store;
pub mod range;
pub mod search;
pub mod station;
pub mod streaming;
pub mod track;
