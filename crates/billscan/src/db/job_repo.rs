//! Job repository: CRUD and state transitions for the `jobs` table.

use rusqlite::{params, Row};

use super::document_repo::{self, DocumentRow};
use super::{Database, DatabaseError};
use crate::jobs::JobStatus;

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
    pub error: Option<String>,
    pub export_path: Option<String>,
    pub total_documents: u32,
    pub total_pages: u32,
    pub processing_time_ms: Option<u64>,
}

impl JobRow {
    /// A fresh `pending` job with no documents recorded yet.
    pub fn new_pending(id: &str, total_documents: u32, now: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Pending,
            created_at: now.to_string(),
            updated_at: now.to_string(),
            error: None,
            export_path: None,
            total_documents,
            total_pages: 0,
            processing_time_ms: None,
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            error: row.get("error")?,
            export_path: row.get("export_path")?,
            total_documents: row.get("total_documents")?,
            total_pages: row.get("total_pages")?,
            processing_time_ms: row.get("processing_time_ms")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a job together with its documents in one transaction.
pub fn insert_with_documents(
    db: &Database,
    job: &JobRow,
    documents: &[DocumentRow],
) -> Result<(), DatabaseError> {
    db.with_transaction(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, status, created_at, updated_at, error, export_path,
             total_documents, total_pages, processing_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.status,
                job.created_at,
                job.updated_at,
                job.error,
                job.export_path,
                job.total_documents,
                job.total_pages,
                job.processing_time_ms,
            ],
        )?;
        for document in documents {
            document_repo::insert_in(conn, document)?;
        }
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries jobs with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let status = filter.status.map(|s| s.as_str());
        let total: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE (?1 IS NULL OR status = ?1)",
            params![status],
            |r| r.get(0),
        )?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![status, limit, offset], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Atomically moves a job from `pending` to `processing`.
///
/// Returns `false` when the job does not exist or is in any other state,
/// in which case nothing is written.
pub fn claim(db: &Database, id: &str, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, updated_at = ?3
             WHERE id = ?1 AND status = ?4",
            params![id, JobStatus::Processing, updated_at, JobStatus::Pending],
        )?;
        Ok(changed == 1)
    })
}

/// Marks a processing job as completed with its totals.
pub fn mark_completed(
    db: &Database,
    id: &str,
    total_pages: u32,
    processing_time_ms: u64,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = ?2, total_pages = ?3, processing_time_ms = ?4,
             error = NULL, updated_at = ?5 WHERE id = ?1",
            params![
                id,
                JobStatus::Completed,
                total_pages,
                processing_time_ms,
                updated_at
            ],
        )?;
        Ok(())
    })
}

/// Marks a job as failed and stores the error text.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE jobs SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, JobStatus::Failed, error, updated_at],
        )?;
        Ok(())
    })
}

/// Resets a terminal job back to `pending`.
///
/// Clears the error and export reference, every document's recognition
/// output, and every extraction of the job's documents. Only applies to
/// jobs in `completed` or `failed`; returns `false` otherwise.
pub fn reset_for_retry(db: &Database, id: &str, updated_at: &str) -> Result<bool, DatabaseError> {
    db.with_transaction(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, error = NULL, export_path = NULL,
             processing_time_ms = NULL, updated_at = ?3
             WHERE id = ?1 AND status IN (?4, ?5)",
            params![
                id,
                JobStatus::Pending,
                updated_at,
                JobStatus::Completed,
                JobStatus::Failed
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        conn.execute(
            "UPDATE documents SET ocr_text = NULL, ocr_confidence = NULL, ocr_method = NULL,
             ocr_processed_at = NULL WHERE job_id = ?1",
            params![id],
        )?;
        conn.execute(
            "DELETE FROM extractions
             WHERE document_id IN (SELECT id FROM documents WHERE job_id = ?1)",
            params![id],
        )?;
        Ok(true)
    })
}

/// Deletes a job; documents, extractions and export records cascade.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(changed == 1)
    })
}
