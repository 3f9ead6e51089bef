//! Upload intake: stores files and creates a pending job for them.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::document_repo::DocumentRow;
use crate::db::job_repo::{self, JobRow};
use crate::db::Database;
use crate::error::IntakeError;

/// Extensions accepted at intake, lower case.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }

    /// Reads a local file as an upload named after its file name.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IntakeError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| IntakeError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self { filename, content })
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Ids of a newly created job and its documents, in upload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
    pub document_ids: Vec<String>,
}

pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Validates every upload, stores them under `upload_dir` and records a
/// `pending` job with one document per file.
///
/// Nothing is written when any upload is rejected. Stored files are
/// removed again if the database insert fails.
pub fn submit(
    db: &Database,
    upload_dir: &Path,
    uploads: &[Upload],
) -> Result<Submission, IntakeError> {
    if uploads.is_empty() {
        return Err(IntakeError::NoFiles);
    }

    let mut extensions = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match upload.extension() {
            Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => extensions.push(ext),
            other => {
                return Err(IntakeError::UnsupportedExtension {
                    filename: upload.filename.clone(),
                    extension: other.unwrap_or_default(),
                })
            }
        }
    }

    std::fs::create_dir_all(upload_dir).map_err(|e| IntakeError::StoreFile {
        path: upload_dir.to_path_buf(),
        source: e,
    })?;

    let job_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let mut documents = Vec::with_capacity(uploads.len());
    let mut stored = Vec::with_capacity(uploads.len());

    for (position, (upload, ext)) in uploads.iter().zip(&extensions).enumerate() {
        let document_id = Uuid::new_v4().to_string();
        let path = upload_dir.join(format!("{}.{}", document_id, ext));

        if let Err(e) = store_exclusive(&path, &upload.content) {
            remove_stored(&stored);
            return Err(e);
        }
        stored.push(path.clone());

        documents.push(DocumentRow {
            id: document_id,
            job_id: job_id.clone(),
            position: position as u32,
            original_name: upload.filename.clone(),
            stored_path: path.to_string_lossy().into_owned(),
            file_size: upload.content.len() as u64,
            mime_type: mime_guess::from_path(&upload.filename)
                .first()
                .map(|m| m.essence_str().to_string()),
            file_hash: sha256_hex(&upload.content),
            uploaded_at: now.clone(),
            ocr_text: None,
            ocr_confidence: None,
            ocr_method: None,
            ocr_processed_at: None,
            page_count: 1,
        });
    }

    let job = JobRow::new_pending(&job_id, documents.len() as u32, &now);
    if let Err(e) = job_repo::insert_with_documents(db, &job, &documents) {
        remove_stored(&stored);
        return Err(e.into());
    }

    info!("Created job {} with {} document(s)", job_id, documents.len());

    Ok(Submission {
        job_id,
        document_ids: documents.into_iter().map(|d| d.id).collect(),
    })
}

fn store_exclusive(path: &Path, content: &[u8]) -> Result<(), IntakeError> {
    let store_err = |e| IntakeError::StoreFile {
        path: path.to_path_buf(),
        source: e,
    };
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(store_err)?;
    write_or_discard(file, path, content)
}

/// Writes `content` through `writer`, removing `path` if the write fails.
fn write_or_discard<W: Write>(mut writer: W, path: &Path, content: &[u8]) -> Result<(), IntakeError> {
    if let Err(e) = writer.write_all(content).and_then(|()| writer.flush()) {
        drop(writer);
        remove_stored(&[path.to_path_buf()]);
        return Err(IntakeError::StoreFile {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

fn remove_stored(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to remove stored upload {}: {}", path.display(), e);
        }
    }
}
