//! Database migration system.
//!
//! Versions live in a `_migrations` table. Pending migrations are applied in
//! order, each in its own transaction.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_documents_table",
        sql: include_str!("sql/001_create_documents.sql"),
    },
    Migration {
        version: 2,
        description: "create_jobs_table",
        sql: include_str!("sql/002_create_jobs.sql"),
    },
    Migration {
        version: 3,
        description: "create_sections_table",
        sql: include_str!("sql/003_create_sections.sql"),
    },
    Migration {
        version: 4,
        description: "create_document_images_table",
        sql: include_str!("sql/004_create_document_images.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        log::info!(
            "Applying migration v{} ({})",
            migration.version,
            migration.description
        );

        // schema change and bookkeeping row commit together
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                source: e,
            })?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = migrated();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = migrated();
        // Running again should be a no-op.
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_section_index_is_unique_per_document() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO documents (id, actor, topic, requirements, created_at, updated_at)
             VALUES ('d1', 'a', 't', '{}', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');
             INSERT INTO sections (id, document_id, idx, created_at, updated_at)
             VALUES ('s1', 'd1', 0, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO sections (id, document_id, idx, created_at, updated_at)
             VALUES ('s2', 'd1', 0, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_image_kind_is_checked() {
        let conn = migrated();
        conn.execute_batch(
            "INSERT INTO documents (id, actor, topic, requirements, created_at, updated_at)
             VALUES ('d1', 'a', 't', '{}', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');",
        )
        .unwrap();

        let bad = conn.execute(
            "INSERT INTO document_images (id, document_id, kind, prompt, file_path, mime_type, created_at)
             VALUES ('i1', 'd1', 'THUMBNAIL', 'p', '/tmp/x.png', 'image/png', '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(bad.is_err());
    }
}
