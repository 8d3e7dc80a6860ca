mod fs;
mod http;

use std::sync::Arc;

use color_eyre::Result;

pub use fs::FilesystemObjectStore;
pub use http::HttpObjectStore;

use crate::config::ObjectStoreConfig;
use crate::ports::object_store::ObjectStore;

pub fn from_config(config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStore>> {
    Ok(match config {
        ObjectStoreConfig::Filesystem { root } => {
            tracing::info!(root, "Using filesystem object store");
            Arc::new(FilesystemObjectStore::new(root))
        }
        ObjectStoreConfig::Http { base_url } => {
            tracing::info!(base_url, "Using HTTP object store");
            Arc::new(HttpObjectStore::new(base_url)?)
        }
    })
}
