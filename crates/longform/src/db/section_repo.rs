//! Section repository: the `sections` table.
//!
//! Rows are addressed either by id or by `(document_id, idx)`; the pair is unique.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, get_label, get_timestamp, now_timestamp, Database, DatabaseError};
use crate::model::Section;

fn from_row(row: &Row<'_>) -> Result<Section, rusqlite::Error> {
    Ok(Section {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        job_id: row.get("job_id")?,
        index: row.get("idx")?,
        heading_path: row.get("heading_path")?,
        planned_chars: row.get("planned_chars")?,
        status: get_label(row, "status")?,
        content: row.get("content")?,
        consistency: row.get("consistency")?,
        error: row.get("error")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

/// Inserts every section of an outline. Meant to run inside the outline transaction.
pub fn insert_all_in(conn: &Connection, sections: &[Section]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO sections (id, document_id, job_id, idx, heading_path, planned_chars,
         status, content, consistency, error, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    for section in sections {
        stmt.execute(params![
            section.id,
            section.document_id,
            section.job_id,
            section.index,
            section.heading_path,
            section.planned_chars,
            section.status.as_str(),
            section.content,
            section.consistency,
            section.error,
            format_timestamp(section.created_at),
            format_timestamp(section.updated_at),
        ])?;
    }
    Ok(())
}

/// Removes every section of a document. Returns the number of rows deleted.
pub fn delete_for_document_in(conn: &Connection, document_id: &str) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM sections WHERE document_id = ?1",
        params![document_id],
    )?)
}

pub fn list_for_document_in(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<Section>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM sections WHERE document_id = ?1 ORDER BY idx")?;
    let rows = stmt
        .query_map(params![document_id], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All sections of a document in index order.
pub fn list_for_document(db: &Database, document_id: &str) -> Result<Vec<Section>, DatabaseError> {
    db.with_conn(|conn| list_for_document_in(conn, document_id))
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Section>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row("SELECT * FROM sections WHERE id = ?1", params![id], from_row)
            .optional()?)
    })
}

pub fn find_by_index(
    db: &Database,
    document_id: &str,
    index: u32,
) -> Result<Option<Section>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM sections WHERE document_id = ?1 AND idx = ?2",
                params![document_id, index],
                from_row,
            )
            .optional()?)
    })
}

/// Overwrites the mutable columns of a section. Identity, index and heading are fixed
/// once the outline is persisted.
pub fn update(db: &Database, section: &Section) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE sections SET job_id=?2, planned_chars=?3, status=?4, content=?5,
             consistency=?6, error=?7, updated_at=?8
             WHERE id=?1",
            params![
                section.id,
                section.job_id,
                section.planned_chars,
                section.status.as_str(),
                section.content,
                section.consistency,
                section.error,
                format_timestamp(section.updated_at),
            ],
        )?;
        Ok(())
    })
}

/// Drops the job reference from every section of a document once generation is over.
pub fn clear_job_in(conn: &Connection, document_id: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE sections SET job_id = NULL, updated_at = ?2 WHERE document_id = ?1",
        params![document_id, now_timestamp()],
    )?;
    Ok(())
}
