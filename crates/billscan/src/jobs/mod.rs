//! Jobs: status machine, intake, extraction runs, export and lifecycle.

pub mod export;
pub mod extract;
pub mod intake;
pub mod lifecycle;
pub mod status;

pub use export::{export_job, ExportData, ExportGenerator, ExportOutcome, JsonExporter};
pub use extract::{run_extraction, DocumentExtraction};
pub use intake::{submit, Submission, Upload, ALLOWED_EXTENSIONS};
pub use lifecycle::{job_detail, list_jobs, DocumentDetail, JobDetail};
pub use status::JobStatus;
