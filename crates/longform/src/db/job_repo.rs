//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{format_timestamp, get_label, get_timestamp, get_timestamp_opt, Database, DatabaseError};
use crate::model::{Job, JobStatus};

fn from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    Ok(Job {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        topology: get_label(row, "topology")?,
        status: get_label(row, "status")?,
        step: get_label(row, "step")?,
        progress: row.get("progress")?,
        cursor: row.get("cursor")?,
        error: row.get("error")?,
        created_at: get_timestamp(row, "created_at")?,
        started_at: get_timestamp_opt(row, "started_at")?,
        finished_at: get_timestamp_opt(row, "finished_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub document_id: Option<String>,
    pub limit: Option<u64>,
}

pub fn insert_in(conn: &Connection, job: &Job) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, document_id, topology, status, step, progress, cursor, error,
         created_at, started_at, finished_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            job.id,
            job.document_id,
            job.topology.as_str(),
            job.status.as_str(),
            job.step.as_str(),
            job.progress,
            job.cursor,
            job.error,
            format_timestamp(job.created_at),
            job.started_at.map(format_timestamp),
            job.finished_at.map(format_timestamp),
            format_timestamp(job.updated_at),
        ],
    )?;
    Ok(())
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    db.with_conn(|conn| insert_in(conn, job))
}

/// Updates an existing job row. All fields except `id`, `document_id`, `topology`
/// and `created_at` are overwritten; the topology is fixed at creation.
pub fn update_in(conn: &Connection, job: &Job) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET status=?2, step=?3, progress=?4, cursor=?5, error=?6,
         started_at=?7, finished_at=?8, updated_at=?9
         WHERE id=?1",
        params![
            job.id,
            job.status.as_str(),
            job.step.as_str(),
            job.progress,
            job.cursor,
            job.error,
            job.started_at.map(format_timestamp),
            job.finished_at.map(format_timestamp),
            format_timestamp(job.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update(db: &Database, job: &Job) -> Result<(), DatabaseError> {
    db.with_conn(|conn| update_in(conn, job))
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Job>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], from_row)
            .optional()?)
    })
}

/// Most recent job for a document.
pub fn find_latest_for_document(
    db: &Database,
    document_id: &str,
) -> Result<Option<Job>, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn
            .query_row(
                "SELECT * FROM jobs WHERE document_id = ?1 ORDER BY created_at DESC LIMIT 1",
                params![document_id],
                from_row,
            )
            .optional()?)
    })
}

/// Lists jobs matching the filter, newest first.
pub fn query(db: &Database, filter: &JobFilter) -> Result<Vec<Job>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }
        if let Some(ref document_id) = filter.document_id {
            conditions.push(format!("document_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(document_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        param_values.push(Box::new(filter.limit.unwrap_or(100) as i64));
        let sql = format!(
            "SELECT * FROM jobs {} ORDER BY created_at DESC LIMIT ?{}",
            where_clause,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_ref.as_slice(), from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
