use color_eyre::{Result, eyre::Context};
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection, DbErr, SqlErr};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Tenant used when the deployment does not partition the catalog
pub const DEFAULT_TENANT_ID: Uuid = Uuid::nil();

pub struct Database {
    pub conn: DatabaseConnection,
}

impl Database {
    /// Connect to the catalog and bring the schema up to date
    pub async fn connect(url: &str) -> Result<Self> {
        tracing::debug!("Opening catalog database");

        // Create parent directories for file-backed SQLite databases
        if let Some(path) = url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent).wrap_err_with(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let mut opt = ConnectOptions::new(url.to_owned());
        opt.max_connections(20)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt)
            .await
            .wrap_err("Failed to open catalog database")?;

        let database = Database { conn };
        database.migrate().await?;

        tracing::info!("Catalog database ready");
        Ok(database)
    }

    pub async fn migrate(&self) -> Result<()> {
        tracing::debug!("Running database migrations");
        migration::Migrator::up(&self.conn, None)
            .await
            .wrap_err("Failed to run database migrations")
    }

    pub async fn ping(&self) -> Result<()> {
        self.conn
            .ping()
            .await
            .wrap_err("Catalog database is unreachable")
    }
}

/// True when the error is a unique-constraint violation
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
