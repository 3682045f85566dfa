//! SQLite connection pool and schema.

use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Shared handle to the bounded connection pool. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Database(SqlitePool);

impl Database {
    /// Open the pool described by `config` and provision the schema.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseSetupError> {
        if !config.url.starts_with("sqlite:") {
            let scheme = config.url.split(':').next().unwrap_or_default();
            return Err(DatabaseSetupError::UnknownDbType(scheme.to_string()));
        }

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(DatabaseSetupError::InvalidUrl)?
            .create_if_missing(true);

        let filename = options.get_filename().to_path_buf();
        let in_memory = filename.to_string_lossy().contains("in-memory")
            || config.url.contains(":memory:");

        if !in_memory {
            if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(DatabaseSetupError::Io)?;
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Opening database"
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(DatabaseSetupError::Unavailable)?;

        let db = Database(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database on a single pinned connection.
    ///
    /// Each SQLite in-memory database lives only as long as its connection, so
    /// the connection is never recycled.
    pub async fn in_memory() -> Result<Self, DatabaseSetupError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(DatabaseSetupError::InvalidUrl)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(DatabaseSetupError::Unavailable)?;

        let db = Database(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), DatabaseSetupError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.0)
                .await
                .map_err(DatabaseSetupError::MigrationFailed)?;
        }
        Ok(())
    }
}

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Whether a write failed on a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identifier TEXT NOT NULL UNIQUE,
        registration_code TEXT NOT NULL,
        phone_number TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shared_secrets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_identifier TEXT NOT NULL,
        sender_phone TEXT,
        receiver_identifier TEXT NOT NULL,
        receiver_phone TEXT,
        shared_secret TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (sender_identifier, receiver_identifier)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_shared_secrets_phones
    ON shared_secrets (sender_phone, receiver_phone)
    "#,
];

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("invalid database url: {0}")]
    InvalidUrl(sqlx::Error),

    #[error("unable to create database directory: {0}")]
    Io(std::io::Error),

    #[error("unable to perform initial connection and check of the database: {0}")]
    Unavailable(sqlx::Error),

    #[error("error occurred while provisioning the schema: {0}")]
    MigrationFailed(sqlx::Error),

    #[error("requested database type was not recognized: {0}")]
    UnknownDbType(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(db: &Database) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&**db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_schema() {
        let db = Database::in_memory().await.unwrap();
        let tables = table_names(&db).await;

        assert!(tables.contains(&"devices".to_string()));
        assert!(tables.contains(&"shared_secrets".to_string()));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_creates_file_and_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keys.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
            acquire_timeout_secs: 1,
        };

        let db = Database::connect(&config).await.unwrap();
        assert!(path.exists());
        assert!(table_names(&db).await.contains(&"devices".to_string()));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let config = DatabaseConfig {
            url: "postgres://localhost/keys".into(),
            max_connections: 1,
            acquire_timeout_secs: 1,
        };

        assert!(matches!(
            Database::connect(&config).await,
            Err(DatabaseSetupError::UnknownDbType(scheme)) if scheme == "postgres"
        ));
    }
}
