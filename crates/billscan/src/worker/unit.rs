use serde::Serialize;

use crate::error::WorkerError;
use crate::jobs::JobStatus;

/// One job's worth of work for a worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub job_id: String,
    /// Processed strictly in this order.
    pub document_ids: Vec<String>,
    pub languages: Vec<String>,
}

impl WorkUnit {
    pub fn new(job_id: impl Into<String>, document_ids: Vec<String>, languages: Vec<String>) -> Self {
        Self {
            job_id: job_id.into(),
            document_ids,
            languages,
        }
    }
}

/// Returned by a queue once a unit has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub job_id: String,
    pub document_count: usize,
}

/// How a claimed job ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub documents_processed: usize,
    pub total_pages: u32,
    pub processing_time_ms: u64,
}

impl UnitOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// What a pool worker reports back for each unit it picked up.
#[derive(Debug)]
pub struct UnitReport {
    pub job_id: String,
    pub outcome: Result<UnitOutcome, WorkerError>,
}

/// Dispatch seam between intake and whatever runs the work.
pub trait TaskQueue {
    fn enqueue(&self, unit: WorkUnit) -> Result<TaskHandle, WorkerError>;
}
