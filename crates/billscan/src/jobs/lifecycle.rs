//! Caller-facing job operations outside of processing: detail, retry, delete.

use std::path::Path;

use chrono::Utc;
use log::{info, warn};

use crate::db::document_repo::{self, DocumentRow};
use crate::db::export_repo::{self, ExportRecordRow};
use crate::db::extraction_repo::{self, ExtractionRow};
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::Database;
use crate::error::JobError;
use crate::extraction::PatternRegistry;
use crate::jobs::JobStatus;

/// A document together with its current extraction set.
#[derive(Debug, Clone)]
pub struct DocumentDetail {
    pub document: DocumentRow,
    pub extractions: Vec<ExtractionRow>,
    /// Field keys whose patterns match the recognized text. Empty until
    /// the document is recognized.
    pub detected_fields: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct JobDetail {
    pub job: JobRow,
    pub documents: Vec<DocumentDetail>,
    pub exports: Vec<ExportRecordRow>,
}

pub fn find_job(db: &Database, job_id: &str) -> Result<JobRow, JobError> {
    job_repo::find_by_id(db, job_id)?.ok_or_else(|| JobError::NotFound(job_id.to_string()))
}

pub fn list_jobs(db: &Database, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), JobError> {
    Ok(job_repo::query(db, filter)?)
}

pub fn job_detail(
    db: &Database,
    registry: &PatternRegistry,
    job_id: &str,
) -> Result<JobDetail, JobError> {
    let job = find_job(db, job_id)?;
    let documents = document_repo::list_for_job(db, job_id)?
        .into_iter()
        .map(|document| {
            let extractions = extraction_repo::list_for_document(db, &document.id)?;
            let detected_fields = document
                .ocr_text
                .as_deref()
                .map(|text| registry.detect_fields(text))
                .unwrap_or_default();
            Ok(DocumentDetail {
                document,
                extractions,
                detected_fields,
            })
        })
        .collect::<Result<Vec<_>, JobError>>()?;
    let exports = export_repo::list_for_job(db, job_id)?;

    Ok(JobDetail {
        job,
        documents,
        exports,
    })
}

/// Puts a finished job back to `pending` with all recognition and
/// extraction output cleared. Returns the ordered document ids to
/// re-enqueue.
pub fn retry(db: &Database, job_id: &str) -> Result<Vec<String>, JobError> {
    let job = find_job(db, job_id)?;
    if !job.status.can_transition_to(JobStatus::Pending) {
        return Err(JobError::InvalidTransition {
            job_id: job_id.to_string(),
            from: job.status,
            to: JobStatus::Pending,
        });
    }

    let now = Utc::now().to_rfc3339();
    if !job_repo::reset_for_retry(db, job_id, &now)? {
        // Lost a race with another writer; report what the job is now.
        let current = find_job(db, job_id)?;
        return Err(JobError::InvalidTransition {
            job_id: job_id.to_string(),
            from: current.status,
            to: JobStatus::Pending,
        });
    }

    info!("Job {} reset for retry", job_id);

    Ok(document_repo::list_for_job(db, job_id)?
        .into_iter()
        .map(|d| d.id)
        .collect())
}

/// Deletes a job's stored uploads and export artifacts, then its rows.
///
/// A job that is `processing` cannot be deleted. Missing files are
/// logged and skipped.
pub fn delete(db: &Database, job_id: &str) -> Result<(), JobError> {
    let job = find_job(db, job_id)?;
    if job.status == JobStatus::Processing {
        return Err(JobError::Busy(job_id.to_string()));
    }

    for document in document_repo::list_for_job(db, job_id)? {
        remove_file(Path::new(&document.stored_path));
    }
    for export in export_repo::list_for_job(db, job_id)? {
        remove_file(Path::new(&export.file_path));
    }

    if !job_repo::delete(db, job_id)? {
        return Err(JobError::NotFound(job_id.to_string()));
    }

    info!("Deleted job {}", job_id);
    Ok(())
}

fn remove_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("File already gone: {}", path.display());
        }
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
