pub mod event_publisher;
pub mod object_store;
