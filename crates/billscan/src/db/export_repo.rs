//! Export record repository. Records are append-only.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone)]
pub struct ExportRecordRow {
    pub id: i64,
    pub job_id: String,
    pub file_path: String,
    pub file_size: u64,
    pub document_count: u32,
    pub field_count: u32,
    pub exported_at: String,
}

impl ExportRecordRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            file_path: row.get("file_path")?,
            file_size: row.get("file_size")?,
            document_count: row.get("document_count")?,
            field_count: row.get("field_count")?,
            exported_at: row.get("exported_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewExportRecord<'a> {
    pub job_id: &'a str,
    pub file_path: &'a str,
    pub file_size: u64,
    pub document_count: u32,
    pub field_count: u32,
    pub exported_at: &'a str,
}

/// Appends an export record and points the job's export reference at it.
pub fn record(db: &Database, export: &NewExportRecord<'_>) -> Result<i64, DatabaseError> {
    db.with_transaction(|conn| {
        conn.execute(
            "INSERT INTO export_records (job_id, file_path, file_size, document_count,
             field_count, exported_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                export.job_id,
                export.file_path,
                export.file_size,
                export.document_count,
                export.field_count,
                export.exported_at,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE jobs SET export_path = ?2, updated_at = ?3 WHERE id = ?1",
            params![export.job_id, export.file_path, export.exported_at],
        )?;
        Ok(id)
    })
}

/// Lists a job's export records, oldest first.
pub fn list_for_job(db: &Database, job_id: &str) -> Result<Vec<ExportRecordRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM export_records WHERE job_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![job_id], ExportRecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
