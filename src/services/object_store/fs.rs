use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use color_eyre::eyre::{Result, WrapErr, bail};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::ports::object_store::ObjectStore;

/// Object store backed by a directory; keys are paths relative to the root.
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes_root {
            bail!("Invalid object key: {key}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.size(key).await?.is_some())
    }

    async fn size(&self, key: &str) -> Result<Option<u64>> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).wrap_err_with(|| format!("Failed to stat {}", path.display())),
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.resolve(key)?;
        let data = tokio::fs::read(&path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes> {
        if end < start {
            bail!("Invalid byte range {start}-{end}");
        }
        let path = self.resolve(key)?;
        let mut file = File::open(&path)
            .await
            .wrap_err_with(|| format!("Failed to open {}", path.display()))?;
        file.seek(SeekFrom::Start(start))
            .await
            .wrap_err_with(|| format!("Failed to seek {} to {start}", path.display()))?;

        let len = end - start + 1;
        let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        file.take(len)
            .read_to_end(&mut buf)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Ok(Bytes::from(buf))
    }
}
