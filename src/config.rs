use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{Result, eyre::Context, eyre::eyre};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::DEFAULT_TENANT_ID;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite connection URL. Defaults to a file in the data directory.
    #[serde(default)]
    database_url: Option<String>,
    /// Pass-through tenant key stamped on every catalog row
    #[serde(default = "default_tenant_id")]
    pub tenant_id: Uuid,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// Objects are files below `root`, keyed by relative path
    Filesystem { root: String },
    /// Objects are served by an S3-compatible gateway at `base_url/<key>`
    Http { base_url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub fetch_timeout_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub queue_capacity: usize,
    /// Retries after the first attempt before a notification is dropped
    pub max_retries: usize,
    pub transaction_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_retries: 5,
            transaction_timeout_secs: 30,
        }
    }
}

impl IngestConfig {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub queue_capacity: usize,
    /// When unset, outbound events are only logged
    pub playback_webhook_url: Option<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            playback_webhook_url: None,
        }
    }
}

fn default_tenant_id() -> Uuid {
    DEFAULT_TENANT_ID
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            tenant_id: DEFAULT_TENANT_ID,
            object_store: ObjectStoreConfig::Filesystem {
                root: "~/radio-streaming/objects".to_string(),
            },
            stream: StreamConfig::default(),
            ingest: IngestConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join("radio-streaming").join("config.toml"))
    }

    /// Load config from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or_else(|| eyre!("Config file not found"))?;

        Self::from_file(&config_path)
    }

    /// Write the default config to the default path unless one already exists
    pub fn create_default() -> Result<PathBuf> {
        let config_path =
            Self::config_path().ok_or_else(|| eyre!("No config directory on this platform"))?;
        if config_path.exists() {
            return Ok(config_path);
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents =
            toml::to_string_pretty(&Config::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&config_path, contents)
            .wrap_err_with(|| format!("Failed to write config: {}", config_path.display()))?;

        Ok(config_path)
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }

    pub fn database_url(&self) -> Result<String> {
        if let Some(url) = &self.database_url {
            if let Some(path) = url.strip_prefix("sqlite://") {
                return Ok(format!("sqlite://{}", Self::expand_path(path).display()));
            }
            if url.starts_with("sqlite:") {
                return Ok(url.clone());
            }
            return Err(eyre!("Unsupported database URL {url}, expected a sqlite: URL"));
        }

        let data_dir = dirs::data_dir().ok_or_else(|| eyre!("No data directory on this platform"))?;
        let path = data_dir.join("radio-streaming").join("catalog.db");
        Ok(format!("sqlite://{}?mode=rwc", path.display()))
    }

    /// Object store with `~` expanded in filesystem roots
    pub fn object_store(&self) -> ObjectStoreConfig {
        match &self.object_store {
            ObjectStoreConfig::Filesystem { root } => ObjectStoreConfig::Filesystem {
                root: Self::expand_path(root).to_string_lossy().to_string(),
            },
            other => other.clone(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.stream.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [object_store]
            kind = "filesystem"
            root = "/srv/audio"
            "#,
        )
        .unwrap();

        assert_eq!(config.tenant_id, DEFAULT_TENANT_ID);
        assert_eq!(config.ingest.queue_capacity, 256);
        assert_eq!(config.ingest.max_retries, 5);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert!(config.events.playback_webhook_url.is_none());
        assert_eq!(
            config.object_store(),
            ObjectStoreConfig::Filesystem {
                root: "/srv/audio".to_string()
            }
        );
    }

    #[test]
    fn test_http_object_store_and_overrides() {
        let config = Config::from_toml(
            r#"
            database_url = "sqlite:///var/lib/radio/catalog.db?mode=rwc"

            [object_store]
            kind = "http"
            base_url = "http://minio:9000/audio"

            [ingest]
            max_retries = 2

            [events]
            playback_webhook_url = "http://analytics/events"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database_url().unwrap(),
            "sqlite:///var/lib/radio/catalog.db?mode=rwc"
        );
        assert_eq!(config.ingest.max_retries, 2);
        assert_eq!(config.ingest.queue_capacity, 256);
        assert_eq!(
            config.events.playback_webhook_url.as_deref(),
            Some("http://analytics/events")
        );
        assert!(matches!(config.object_store(), ObjectStoreConfig::Http { .. }));
    }

    #[test]
    fn test_non_sqlite_database_url_is_rejected() {
        let config =
            Config::from_toml(r#"database_url = "postgres://radio:radio@db/radio""#).unwrap();
        assert!(config.database_url().is_err());

        let config = Config::from_toml(r#"database_url = "sqlite::memory:""#).unwrap();
        assert_eq!(config.database_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn test_unknown_object_store_kind_is_rejected() {
        let result = Config::from_toml(
            r#"
            [object_store]
            kind = "tape"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let contents = toml::to_string_pretty(&Config::default()).unwrap();
        let config = Config::from_toml(&contents).unwrap();
        assert_eq!(config.object_store, Config::default().object_store);
    }
}
