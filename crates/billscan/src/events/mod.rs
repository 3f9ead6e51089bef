//! Job events: the process-wide topic and fan-out to live listeners.

pub mod fanout;
pub mod registry;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::jobs::JobStatus;

pub use fanout::spawn_fanout;
pub use registry::{ChannelListener, ConnectionRegistry, EventListener, ListenerClosed, ListenerId};

const DEFAULT_CAPACITY: usize = 100;

/// Event published by the worker while it processes a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    JobProgress {
        job_id: String,
        /// Percent of documents done, 0-100.
        progress: u32,
        /// 1-based index of the document just finished.
        current: u32,
        total: u32,
    },
    JobCompleted {
        job_id: String,
        status: JobStatus,
    },
    JobFailed {
        job_id: String,
        status: JobStatus,
        error: String,
    },
}

impl JobEvent {
    pub fn progress(job_id: &str, current: u32, total: u32) -> Self {
        let progress = if total == 0 {
            100
        } else {
            ((100.0 * current as f64) / total as f64).round() as u32
        };
        JobEvent::JobProgress {
            job_id: job_id.to_string(),
            progress,
            current,
            total,
        }
    }

    pub fn completed(job_id: &str) -> Self {
        JobEvent::JobCompleted {
            job_id: job_id.to_string(),
            status: JobStatus::Completed,
        }
    }

    pub fn failed(job_id: &str, error: &str) -> Self {
        JobEvent::JobFailed {
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
            error: error.to_string(),
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::JobProgress { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. } => job_id,
        }
    }

    /// True for completion and failure.
    pub fn is_final(&self) -> bool {
        !matches!(self, JobEvent::JobProgress { .. })
    }
}

/// Broadcast topic carrying job events from workers.
#[derive(Clone)]
pub struct JobEventChannel {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publishes to all current subscribers.
    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
