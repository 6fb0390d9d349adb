//! Connection handle factory for the application database.
//!
//! Every operation opens its own connection and passes it explicitly to the
//! code that needs it. The database runs in WAL mode so readers keep seeing
//! the last committed state while a writer holds the write lock.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteDatabase {
    /// Opens (creating if needed) the database file and switches it to WAL.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let is_new_db = !path.exists();
        if is_new_db {
            info!("Creating new database at {:?}", path);
        }

        let db = Self { path, busy_timeout };
        let conn = db
            .connection()
            .with_context(|| format!("Failed to open database at {:?}", db.path))?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(
                "Database {:?} is running in {} journal mode, readers may block on refresh",
                db.path,
                journal_mode
            );
        }
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh connection. The busy timeout bounds how long any single
    /// statement waits on another writer.
    pub fn connection(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        Ok(conn)
    }

    /// Lightweight liveness probe used by the health endpoint.
    pub fn ping(&self) -> bool {
        match self
            .connection()
            .and_then(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Database ping failed: {}", e);
                false
            }
        }
    }
}
