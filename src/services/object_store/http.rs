use axum::body::Bytes;
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::ports::object_store::ObjectStore;

/// Object store reached over HTTP, e.g. a MinIO bucket exposed at
/// `http://minio:9000/<bucket>`. Objects are addressed as `<base_url>/<key>`.
pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
}

impl HttpObjectStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).wrap_err_with(|| format!("Invalid object store URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Object store URL cannot be a base: {base_url}");
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| eyre!("Object store URL cannot be a base"))?
            .pop_if_empty()
            .extend(key.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ObjectStore for HttpObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.size(key).await?.is_some())
    }

    async fn size(&self, key: &str) -> Result<Option<u64>> {
        let url = self.object_url(key)?;
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .wrap_err_with(|| format!("HEAD {url} failed"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let size = response
                    .headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .ok_or_else(|| eyre!("HEAD {url} returned no Content-Length"))?;
                Ok(Some(size))
            }
            status => Err(eyre!("HEAD {url} returned {status}")),
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let url = self.object_url(key)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .wrap_err_with(|| format!("GET {url} failed"))?
            .error_for_status()
            .wrap_err_with(|| format!("GET {url} was rejected"))?;
        response
            .bytes()
            .await
            .wrap_err_with(|| format!("Failed to read body of {url}"))
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes> {
        if end < start {
            bail!("Invalid byte range {start}-{end}");
        }
        let url = self.object_url(key)?;
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .wrap_err_with(|| format!("GET {url} failed"))?
            .error_for_status()
            .wrap_err_with(|| format!("GET {url} was rejected"))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .wrap_err_with(|| format!("Failed to read body of {url}"))?;

        if status == StatusCode::PARTIAL_CONTENT {
            return Ok(body);
        }

        // The gateway ignored the Range header and sent the whole object
        let len = body.len() as u64;
        let from = start.min(len) as usize;
        let to = end.saturating_add(1).min(len) as usize;
        Ok(body.slice(from..to))
    }
}
