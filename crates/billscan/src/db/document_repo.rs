//! Document repository for the `documents` table.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};
use crate::recognition::RecognitionMethod;

/// A raw document row from the database.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: String,
    pub job_id: String,
    pub position: u32,
    pub original_name: String,
    pub stored_path: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub file_hash: String,
    pub uploaded_at: String,
    pub ocr_text: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub ocr_method: Option<RecognitionMethod>,
    pub ocr_processed_at: Option<String>,
    pub page_count: u32,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            position: row.get("position")?,
            original_name: row.get("original_name")?,
            stored_path: row.get("stored_path")?,
            file_size: row.get("file_size")?,
            mime_type: row.get("mime_type")?,
            file_hash: row.get("file_hash")?,
            uploaded_at: row.get("uploaded_at")?,
            ocr_text: row.get("ocr_text")?,
            ocr_confidence: row.get("ocr_confidence")?,
            ocr_method: row.get("ocr_method")?,
            ocr_processed_at: row.get("ocr_processed_at")?,
            page_count: row.get("page_count")?,
        })
    }

    pub fn is_recognized(&self) -> bool {
        self.ocr_text.is_some()
    }
}

/// Recognition output persisted for one document.
#[derive(Debug, Clone)]
pub struct RecognitionUpdate<'a> {
    pub text: &'a str,
    pub confidence: f64,
    pub method: RecognitionMethod,
    pub page_count: u32,
    pub processed_at: &'a str,
}

pub(crate) fn insert_in(conn: &Connection, doc: &DocumentRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, job_id, position, original_name, stored_path, file_size,
         mime_type, file_hash, uploaded_at, ocr_text, ocr_confidence, ocr_method,
         ocr_processed_at, page_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            doc.id,
            doc.job_id,
            doc.position,
            doc.original_name,
            doc.stored_path,
            doc.file_size,
            doc.mime_type,
            doc.file_hash,
            doc.uploaded_at,
            doc.ocr_text,
            doc.ocr_confidence,
            doc.ocr_method,
            doc.ocr_processed_at,
            doc.page_count,
        ],
    )?;
    Ok(())
}

/// Finds a document by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM documents WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], DocumentRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists a job's documents in intake order.
pub fn list_for_job(db: &Database, job_id: &str) -> Result<Vec<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM documents WHERE job_id = ?1 ORDER BY position, id")?;
        let rows = stmt
            .query_map(params![job_id], DocumentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Stores the recognition output of a single document.
pub fn record_recognition(
    db: &Database,
    id: &str,
    update: &RecognitionUpdate<'_>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE documents SET ocr_text = ?2, ocr_confidence = ?3, ocr_method = ?4,
             page_count = ?5, ocr_processed_at = ?6 WHERE id = ?1",
            params![
                id,
                update.text,
                update.confidence,
                update.method,
                update.page_count,
                update.processed_at,
            ],
        )?;
        Ok(())
    })
}
