//! Extraction repository for the `extractions` table.
//!
//! A document's extraction set is always replaced as a whole.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::extraction::{ExtractedField, ExtractionMethod};

/// A raw extraction row from the database.
#[derive(Debug, Clone)]
pub struct ExtractionRow {
    pub id: i64,
    pub document_id: String,
    pub field_key: String,
    pub field_label: String,
    pub value: Option<String>,
    pub confidence: u32,
    pub method: ExtractionMethod,
    pub extracted_at: String,
}

impl ExtractionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            field_key: row.get("field_key")?,
            field_label: row.get("field_label")?,
            value: row.get("value")?,
            confidence: row.get("confidence")?,
            method: row.get("method")?,
            extracted_at: row.get("extracted_at")?,
        })
    }
}

/// Deletes every extraction of `document_id` and inserts `fields` in one
/// transaction.
pub fn replace_for_document(
    db: &Database,
    document_id: &str,
    fields: &[ExtractedField],
    extracted_at: &str,
) -> Result<(), DatabaseError> {
    db.with_transaction(|conn| {
        conn.execute(
            "DELETE FROM extractions WHERE document_id = ?1",
            params![document_id],
        )?;

        let mut stmt = conn.prepare(
            "INSERT INTO extractions (document_id, field_key, field_label, value, confidence,
             method, extracted_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for field in fields {
            stmt.execute(params![
                document_id,
                field.key,
                field.label,
                field.value,
                field.confidence,
                field.method,
                extracted_at,
            ])?;
        }
        Ok(())
    })
}

/// Lists a document's extractions in insertion order.
pub fn list_for_document(
    db: &Database,
    document_id: &str,
) -> Result<Vec<ExtractionRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM extractions WHERE document_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![document_id], ExtractionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
