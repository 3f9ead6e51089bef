use std::path::PathBuf;
use thiserror::Error;

use crate::jobs::JobStatus;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid pattern for field '{key}': {source}")]
    InvalidPattern {
        key: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Language model request failed: {0}")]
    Request(String),

    #[error("Language model returned status {0}")]
    Status(u16),

    #[error("Language model returned unusable output: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("No files submitted")]
    NoFiles,

    #[error("File type '{extension}' not allowed for '{filename}'")]
    UnsupportedExtension { filename: String, extension: String },

    #[error("Failed to read upload '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to store upload at '{path}': {source}")]
    StoreFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job '{job_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job '{0}' is still processing")]
    Busy(String),

    #[error("No fields selected")]
    NoFieldsSelected,

    #[error("Document '{0}' not OCR processed yet")]
    NotRecognized(String),

    #[error("No extracted data to export")]
    NothingToExport,

    #[error("Export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Work queue is full")]
    QueueFull,

    #[error("Document not found: {0}")]
    DocumentMissing(String),

    #[error("Document '{document_id}' does not belong to job '{job_id}'")]
    ForeignDocument { document_id: String, job_id: String },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Job '{job_id}' could not be claimed (status {status})")]
    ClaimRejected { job_id: String, status: String },

    #[error(transparent)]
    Database(#[from] crate::db::DatabaseError),
}
