use axum::body::Bytes;
use color_eyre::eyre::Result;

/// Port trait for the blob storage holding the audio objects.
///
/// Implementations live in `services::object_store` (filesystem and HTTP
/// gateway) or test mocks. Ranges are inclusive on both ends.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Size of the stored object in bytes, `None` when it does not exist.
    async fn size(&self, key: &str) -> Result<Option<u64>>;

    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes>;
}
