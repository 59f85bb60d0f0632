//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`. The schema is
//! applied lazily on first use (see [`bootstrap`]).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row};

use crate::model::ParseLabelError;

pub mod asset_repo;
pub mod bootstrap;
pub mod document_repo;
pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod section_repo;

pub use bootstrap::BootstrapPolicy;
pub use error::DatabaseError;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`); clones share the connection and the
/// schema-ready flag. WAL mode is enabled for file databases.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    ready: Arc<AtomicBool>,
    policy: BootstrapPolicy,
}

impl Database {
    /// Opens (or creates) the database at the given path. Migrations run on first use.
    pub fn open(path: &Path, policy: BootstrapPolicy) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(policy.busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        log::info!("Database opened at {}", path.display());

        Ok(Self::from_connection(conn, policy))
    }

    /// Opens an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Ok(Self::from_connection(conn, BootstrapPolicy::default()))
    }

    fn from_connection(conn: Connection, policy: BootstrapPolicy) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            ready: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    /// Whether the schema has been applied through this handle (or a clone of it).
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Applies the schema now instead of on first use.
    ///
    /// Blocks the calling thread for the whole bootstrap, including any busy
    /// backoff. Async callers should run it through `spawn_blocking` at startup.
    pub fn ensure_schema(&self) -> Result<(), DatabaseError> {
        self.with_conn(|_| Ok(()))
    }

    /// Provides locked access to the underlying connection, bootstrapping the
    /// schema first if this is the first access. The bootstrap sleeps between
    /// busy retries while the connection mutex is held.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        if !self.ready.load(Ordering::Acquire) {
            bootstrap::run(&conn, &self.policy)?;
            self.ready.store(true, Ordering::Release);
        }
        f(&conn)
    }

    /// Runs `f` inside a transaction; commits if it returns `Ok`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }
}

/// Returns the canonical database path: `~/.longform/data/longform.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".longform").join("data").join("longform.db"))
}

/// Fixed-width UTC timestamps so TEXT comparison matches time order.
pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn conversion_error(
    row: &Row<'_>,
    column: &str,
    err: Box<dyn std::error::Error + Send + Sync>,
) -> rusqlite::Error {
    match row.as_ref().column_index(column) {
        Ok(idx) => rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err),
        Err(e) => e,
    }
}

/// Reads a TEXT column holding a variant label.
pub(crate) fn get_label<T>(row: &Row<'_>, column: &str) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = ParseLabelError>,
{
    let raw: String = row.get(column)?;
    raw.parse::<T>()
        .map_err(|e| conversion_error(row, column, Box::new(e)))
}

/// Reads a TEXT column holding an RFC 3339 timestamp.
pub(crate) fn get_timestamp(row: &Row<'_>, column: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, column, Box::new(e)))
}

pub(crate) fn get_timestamp_opt(
    row: &Row<'_>,
    column: &str,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(column)?;
    match raw {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| conversion_error(row, column, Box::new(e))),
    }
}

/// Reads a TEXT column holding JSON.
pub(crate) fn get_json<T>(row: &Row<'_>, column: &str) -> Result<T, rusqlite::Error>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(row, column, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_bootstraps_lazily() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.is_ready());
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert!(count > 0);
            Ok(())
        })
        .unwrap();
        assert!(db.is_ready());
    }

    #[test]
    fn test_open_file_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let db = Database::open(&path, BootstrapPolicy::default()).unwrap();
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert!(count > 0);
            Ok(())
        })
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("longform.db"));
        assert!(path.to_string_lossy().contains(".longform"));
    }

    #[tokio::test]
    async fn test_ensure_schema_on_blocking_thread() {
        let db = Database::open_in_memory().unwrap();
        let handle = db.clone();
        tokio::task::spawn_blocking(move || handle.ensure_schema())
            .await
            .unwrap()
            .unwrap();
        assert!(db.is_ready());
    }

    #[test]
    fn test_clones_share_ready_flag() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        db.with_conn(|_| Ok(())).unwrap();
        assert!(db2.is_ready());
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<(), DatabaseError> = db.with_tx(|conn| {
            conn.execute(
                "INSERT INTO documents (id, actor, topic, requirements, topology, options, created_at, updated_at)
                 VALUES ('d1', 'a', 't', '{}', 'standard', '{}', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Err(DatabaseError::LockPoisoned)
        });
        assert!(result.is_err());

        let count: u32 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
