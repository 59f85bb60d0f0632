//! Document repository: CRUD operations for the `documents` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    format_timestamp, get_json, get_label, get_timestamp, now_timestamp, Database, DatabaseError,
};
use crate::model::Document;

fn from_row(row: &Row<'_>) -> Result<Document, rusqlite::Error> {
    Ok(Document {
        id: row.get("id")?,
        actor: row.get("actor")?,
        topic: row.get("topic")?,
        title: row.get("title")?,
        requirements: get_json(row, "requirements")?,
        topology: get_label(row, "topology")?,
        options: get_json(row, "options")?,
        body: row.get("body")?,
        research_notes: row.get("research_notes")?,
        comparison_table: row.get("comparison_table")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

/// Inserts a new document row on an open connection or transaction.
pub fn insert_in(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    let requirements =
        serde_json::to_string(&doc.requirements).map_err(|e| DatabaseError::Encode {
            column: "requirements",
            source: e,
        })?;
    let options = serde_json::to_string(&doc.options).map_err(|e| DatabaseError::Encode {
        column: "options",
        source: e,
    })?;

    conn.execute(
        "INSERT INTO documents (id, actor, topic, title, requirements, topology, options, body,
         research_notes, comparison_table, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            doc.id,
            doc.actor,
            doc.topic,
            doc.title,
            requirements,
            doc.topology.as_str(),
            options,
            doc.body,
            doc.research_notes,
            doc.comparison_table,
            format_timestamp(doc.created_at),
            format_timestamp(doc.updated_at),
        ],
    )?;
    Ok(())
}

pub fn insert(db: &Database, doc: &Document) -> Result<(), DatabaseError> {
    db.with_conn(|conn| insert_in(conn, doc))
}

pub fn find_by_id_in(conn: &Connection, id: &str) -> Result<Option<Document>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM documents WHERE id = ?1",
            params![id],
            from_row,
        )
        .optional()?)
}

/// Finds a document by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Document>, DatabaseError> {
    db.with_conn(|conn| find_by_id_in(conn, id))
}

/// Stores the outline title.
pub fn set_title_in(conn: &Connection, id: &str, title: Option<&str>) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET title = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, title, now_timestamp()],
    )?;
    Ok(())
}

pub fn set_research_notes(db: &Database, id: &str, notes: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE documents SET research_notes = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, notes, now_timestamp()],
        )?;
        Ok(())
    })
}

pub fn set_comparison_table(db: &Database, id: &str, table: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE documents SET comparison_table = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, table, now_timestamp()],
        )?;
        Ok(())
    })
}

pub fn set_body_in(conn: &Connection, id: &str, body: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET body = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, body, now_timestamp()],
    )?;
    Ok(())
}

/// Counts documents the actor created at or after `since`.
pub fn count_created_since(
    db: &Database,
    actor: &str,
    since: DateTime<Utc>,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE actor = ?1 AND created_at >= ?2",
            params![actor, format_timestamp(since)],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComparisonConfig, DocumentOptions, StructuralRequirements, Topology};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_doc(actor: &str) -> Document {
        Document::new(
            actor,
            "Choosing a message queue",
            StructuralRequirements::default(),
            Topology::Comparison,
            DocumentOptions {
                llmo: None,
                comparison: Some(ComparisonConfig {
                    competitors: vec!["Kafka".to_string(), "NATS".to_string()],
                    criteria: vec!["latency".to_string()],
                }),
            },
        )
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let doc = sample_doc("alice");
        insert(&db, &doc).unwrap();

        let found = find_by_id(&db, &doc.id).unwrap().unwrap();
        assert_eq!(found.topic, "Choosing a message queue");
        assert_eq!(found.topology, Topology::Comparison);
        assert_eq!(found.options, doc.options);
        assert_eq!(found.requirements, doc.requirements);
        assert!(found.body.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_output_columns() {
        let db = test_db();
        let doc = sample_doc("alice");
        insert(&db, &doc).unwrap();

        db.with_conn(|conn| {
            set_title_in(conn, &doc.id, Some("Queues compared"))?;
            set_body_in(conn, &doc.id, "## Intro\n\nText")
        })
        .unwrap();
        set_research_notes(&db, &doc.id, "Kafka: log based").unwrap();
        set_comparison_table(&db, &doc.id, "| a | b |").unwrap();

        let found = find_by_id(&db, &doc.id).unwrap().unwrap();
        assert_eq!(found.title.as_deref(), Some("Queues compared"));
        assert_eq!(found.body.as_deref(), Some("## Intro\n\nText"));
        assert_eq!(found.research_notes.as_deref(), Some("Kafka: log based"));
        assert_eq!(found.comparison_table.as_deref(), Some("| a | b |"));
        assert!(found.is_complete());
    }

    #[test]
    fn test_count_created_since() {
        let db = test_db();
        insert(&db, &sample_doc("alice")).unwrap();
        insert(&db, &sample_doc("alice")).unwrap();
        insert(&db, &sample_doc("bob")).unwrap();

        let midnight = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(count_created_since(&db, "alice", midnight).unwrap(), 2);
        assert_eq!(count_created_since(&db, "bob", midnight).unwrap(), 1);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(count_created_since(&db, "alice", future).unwrap(), 0);
    }
}
