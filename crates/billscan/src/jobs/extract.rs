//! Field extraction over every recognized document of a job.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::db::document_repo;
use crate::db::extraction_repo;
use crate::db::Database;
use crate::error::JobError;
use crate::extraction::{ExtractedField, FieldExtractor};
use crate::jobs::lifecycle::find_job;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentExtraction {
    pub document_id: String,
    pub filename: String,
    pub fields: Vec<ExtractedField>,
}

/// Extracts `keys` from each document of `job_id` and replaces each
/// document's stored extraction set.
///
/// At least one key must name a known field, and every document must
/// already carry recognized text; otherwise nothing is extracted.
pub async fn run_extraction<S: AsRef<str> + Sync>(
    db: &Database,
    extractor: &FieldExtractor,
    job_id: &str,
    keys: &[S],
) -> Result<Vec<DocumentExtraction>, JobError> {
    if extractor.registry().resolve(keys).is_empty() {
        return Err(JobError::NoFieldsSelected);
    }

    find_job(db, job_id)?;
    let documents = document_repo::list_for_job(db, job_id)?;

    if let Some(pending) = documents.iter().find(|d| !d.is_recognized()) {
        return Err(JobError::NotRecognized(pending.original_name.clone()));
    }

    let mut results = Vec::with_capacity(documents.len());
    for document in documents {
        let text = document.ocr_text.as_deref().unwrap_or_default();
        let fields = extractor.extract(text, keys).await;

        let now = Utc::now().to_rfc3339();
        extraction_repo::replace_for_document(db, &document.id, &fields, &now)?;

        results.push(DocumentExtraction {
            document_id: document.id,
            filename: document.original_name,
            fields,
        });
    }

    info!(
        job_id = %job_id,
        documents = results.len(),
        fields = keys.len(),
        "Extraction finished"
    );

    Ok(results)
}
