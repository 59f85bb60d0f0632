//! One-time schema bootstrap with its own retry budget.
//!
//! [`Database::with_conn`](super::Database::with_conn) calls [`run`] the first
//! time any handle touches the connection and memoizes success in a shared
//! ready flag. Busy/locked errors (another process holding the file during
//! its own migration) are retried with exponential backoff; anything else
//! fails immediately.
//!
//! The backoff is a thread sleep taken while the connection mutex is held, so
//! a contended bootstrap stalls every database user. The binary bootstraps once
//! on a blocking thread before any job work starts
//! ([`Database::ensure_schema`](super::Database::ensure_schema)).

use std::time::Duration;

use rusqlite::Connection;

use super::error::DatabaseError;
use super::migrations;

/// Retry budget for schema bootstrap, plus the SQLite busy timeout applied to the connection.
#[derive(Debug, Clone)]
pub struct BootstrapPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub busy_timeout: Duration,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(200),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

pub(crate) fn run(conn: &Connection, policy: &BootstrapPolicy) -> Result<(), DatabaseError> {
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match migrations::run_all(conn) {
            Ok(()) => {
                if attempt > 1 {
                    log::info!("Schema bootstrap succeeded on attempt {}", attempt);
                }
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                log::warn!(
                    "Schema bootstrap attempt {}/{} hit a transient error ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    backoff
                );
                std::thread::sleep(backoff);
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => {
                return Err(DatabaseError::Bootstrap {
                    attempts: attempt,
                    source: Box::new(e),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_applies_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn, &BootstrapPolicy::default()).unwrap();

        let tables: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('documents', 'jobs', 'sections', 'document_images')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_bootstrap_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn, &BootstrapPolicy::default()).unwrap();
        run(&conn, &BootstrapPolicy::default()).unwrap();
    }

    #[test]
    fn test_bootstrap_retries_while_file_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.db");

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.busy_timeout(Duration::from_millis(1)).unwrap();
        let policy = BootstrapPolicy {
            attempts: 2,
            initial_backoff: Duration::from_millis(5),
            busy_timeout: Duration::from_millis(1),
        };

        let err = run(&conn, &policy).unwrap_err();
        match err {
            DatabaseError::Bootstrap { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(source.is_transient());
            }
            other => panic!("expected Bootstrap error, got {other:?}"),
        }

        holder.execute_batch("COMMIT;").unwrap();
        run(&conn, &policy).unwrap();
    }
}
