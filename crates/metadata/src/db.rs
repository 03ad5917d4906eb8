//! SQLite pool behind the metadata index.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
/// Pool size when the caller does not configure one.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Concurrent uploads each insert a record and WAL allows a single writer,
/// so inserts queue behind each other for at most this long.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection pool for the metadata index.
///
/// The schema is migrated before a `Database` is handed out. Wrap it in a
/// [`Repository`](crate::Repository) to read and write records.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (or create) the index at `path` with the default pool size.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with(path, None).await
    }

    /// Open (or create) the index at `path`, creating missing parent
    /// directories. A pool size of `None` or zero means the default.
    pub async fn connect_with(path: impl AsRef<Path>, max_connections: Option<u32>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::options().filename(path).create_if_missing(true);
        let max_connections = max_connections.filter(|max| *max > 0).unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Self::open(options, max_connections).await
    }

    /// A throwaway index that lives as long as the pool.
    ///
    /// Not gated behind `#[cfg(test)]`: dependent crates use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every connection to ":memory:" is its own database, so one only.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // Folder references rely on ON DELETE SET NULL.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
    }

    #[instrument(skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)?;
        tracing::debug!("metadata schema up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for checked-out connections to come back, then close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
