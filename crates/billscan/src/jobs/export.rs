//! Export of a job's extracted values to a file artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::db::document_repo;
use crate::db::export_repo::{self, NewExportRecord};
use crate::db::extraction_repo;
use crate::db::Database;
use crate::error::JobError;
use crate::jobs::lifecycle::find_job;

#[derive(Debug, Clone, Serialize)]
pub struct ExportField {
    pub key: String,
    pub label: String,
    pub value: Option<String>,
    pub confidence: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub filename: String,
    pub extracted_fields: Vec<ExportField>,
}

/// Everything handed to a generator for one job.
#[derive(Debug, Clone, Serialize)]
pub struct ExportData {
    pub job_id: String,
    pub exported_at: String,
    pub documents: Vec<ExportDocument>,
}

impl ExportData {
    pub fn field_count(&self) -> usize {
        self.documents.iter().map(|d| d.extracted_fields.len()).sum()
    }
}

/// Renders export data into a file format.
pub trait ExportGenerator: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    fn render(&self, data: &ExportData) -> Result<Vec<u8>, JobError>;
}

pub struct JsonExporter;

impl ExportGenerator for JsonExporter {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, data: &ExportData) -> Result<Vec<u8>, JobError> {
        serde_json::to_vec_pretty(data).map_err(|e| JobError::Export(e.to_string()))
    }
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub file_size: u64,
    pub document_count: u32,
    pub field_count: u32,
}

/// Collects the job's extractions, writes them with `generator` under
/// `export_dir`, points the job at the artifact and appends an export
/// record. Documents without extractions are left out.
pub fn export_job(
    db: &Database,
    generator: &dyn ExportGenerator,
    export_dir: &Path,
    job_id: &str,
) -> Result<ExportOutcome, JobError> {
    find_job(db, job_id)?;

    let now = Utc::now();
    let mut documents = Vec::new();
    for document in document_repo::list_for_job(db, job_id)? {
        let extractions = extraction_repo::list_for_document(db, &document.id)?;
        if extractions.is_empty() {
            continue;
        }
        documents.push(ExportDocument {
            filename: document.original_name,
            extracted_fields: extractions
                .into_iter()
                .map(|e| ExportField {
                    key: e.field_key,
                    label: e.field_label,
                    value: e.value,
                    confidence: e.confidence,
                })
                .collect(),
        });
    }

    if documents.is_empty() {
        return Err(JobError::NothingToExport);
    }

    let data = ExportData {
        job_id: job_id.to_string(),
        exported_at: now.to_rfc3339(),
        documents,
    };
    let content = generator.render(&data)?;

    let prefix: String = job_id.chars().take(8).collect();
    let stem = format!("export_{}_{}", prefix, now.format("%Y%m%d_%H%M%S"));
    let path = write_artifact(export_dir, &stem, generator.extension(), &content)?;

    let outcome = ExportOutcome {
        file_size: content.len() as u64,
        document_count: data.documents.len() as u32,
        field_count: data.field_count() as u32,
        path,
    };

    let file_path = outcome.path.to_string_lossy();
    export_repo::record(
        db,
        &NewExportRecord {
            job_id,
            file_path: &file_path,
            file_size: outcome.file_size,
            document_count: outcome.document_count,
            field_count: outcome.field_count,
            exported_at: &data.exported_at,
        },
    )?;

    info!(
        "Exported job {} to {} ({} documents, {} fields)",
        job_id,
        outcome.path.display(),
        outcome.document_count,
        outcome.field_count
    );

    Ok(outcome)
}

/// Creates `{stem}.{ext}` exclusively, numbering the stem on collision.
fn write_artifact(dir: &Path, stem: &str, ext: &str, content: &[u8]) -> Result<PathBuf, JobError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| JobError::Export(format!("{}: {}", dir.display(), e)))?;

    for counter in 1..=1000 {
        let filename = if counter == 1 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let path = dir.join(filename);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(content)
                    .map_err(|e| JobError::Export(format!("{}: {}", path.display(), e)))?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(JobError::Export(format!("{}: {}", path.display(), e))),
        }
    }

    Err(JobError::Export(format!(
        "no free file name for {} in {}",
        stem,
        dir.display()
    )))
}
