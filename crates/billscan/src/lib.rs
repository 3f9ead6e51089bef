pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extraction;
pub mod jobs;
pub mod logging;
pub mod recognition;
pub mod sanitize;
pub mod worker;

pub use config::{load_config, load_config_from_str, Config};
pub use db::Database;
pub use error::{ConfigError, ExtractionError, IntakeError, JobError, ProcessError, WorkerError};
pub use events::{ConnectionRegistry, EventListener, JobEvent, JobEventChannel};
pub use extraction::{available_fields, ExtractedField, ExtractionMethod, FieldExtractor};
pub use jobs::JobStatus;
pub use recognition::{RecognitionMethod, RecognitionResult, RecognitionStage};
pub use worker::{BatchProcessor, TaskQueue, WorkUnit, WorkerPool};
