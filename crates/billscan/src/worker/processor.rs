use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, info_span};

use crate::db::document_repo::{self, RecognitionUpdate};
use crate::db::job_repo;
use crate::db::Database;
use crate::error::WorkerError;
use crate::events::{JobEvent, JobEventChannel};
use crate::jobs::JobStatus;
use crate::recognition::RecognitionStage;
use crate::worker::unit::{UnitOutcome, WorkUnit};

/// Drives recognition over one job's documents and records the result.
///
/// Holds a recognition stage, so it lives on a single thread.
pub struct BatchProcessor {
    db: Database,
    events: JobEventChannel,
    stage: RecognitionStage,
}

impl BatchProcessor {
    pub fn new(db: Database, events: JobEventChannel, stage: RecognitionStage) -> Self {
        Self { db, events, stage }
    }

    pub fn stage(&self) -> &RecognitionStage {
        &self.stage
    }

    /// Claims the job, recognizes each document in order and finishes the
    /// job as `completed` or `failed`.
    ///
    /// A document failure ends the job as `failed` and is reported in the
    /// outcome, not as an error. Errors are returned only when the claim
    /// is rejected or the job status itself cannot be written.
    pub fn process(&mut self, unit: &WorkUnit) -> Result<UnitOutcome, WorkerError> {
        let _span = info_span!(
            "worker.process",
            job_id = %unit.job_id,
            documents = unit.document_ids.len()
        )
        .entered();

        if !job_repo::claim(&self.db, &unit.job_id, &Utc::now().to_rfc3339())? {
            let status = job_repo::find_by_id(&self.db, &unit.job_id)?
                .map(|job| job.status.to_string())
                .unwrap_or_else(|| "missing".to_string());
            return Err(WorkerError::ClaimRejected {
                job_id: unit.job_id.clone(),
                status,
            });
        }

        let started = Instant::now();
        let mut processed = 0;
        let mut total_pages = 0;
        let result = self.run_documents(unit, &mut processed, &mut total_pages);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let now = Utc::now().to_rfc3339();

        match result {
            Ok(()) => {
                job_repo::mark_completed(&self.db, &unit.job_id, total_pages, elapsed_ms, &now)?;
                self.events.send(JobEvent::completed(&unit.job_id));
                info!(pages = total_pages, elapsed_ms, "Job completed");

                Ok(UnitOutcome {
                    job_id: unit.job_id.clone(),
                    status: JobStatus::Completed,
                    error: None,
                    documents_processed: processed,
                    total_pages,
                    processing_time_ms: elapsed_ms,
                })
            }
            Err(e) => {
                let message = e.to_string();
                job_repo::mark_failed(&self.db, &unit.job_id, &message, &now)?;
                self.events.send(JobEvent::failed(&unit.job_id, &message));
                error!(error = %message, processed, "Job failed");

                Ok(UnitOutcome {
                    job_id: unit.job_id.clone(),
                    status: JobStatus::Failed,
                    error: Some(message),
                    documents_processed: processed,
                    total_pages,
                    processing_time_ms: elapsed_ms,
                })
            }
        }
    }

    fn run_documents(
        &mut self,
        unit: &WorkUnit,
        processed: &mut usize,
        total_pages: &mut u32,
    ) -> Result<(), WorkerError> {
        let total = unit.document_ids.len() as u32;

        for (index, document_id) in unit.document_ids.iter().enumerate() {
            let document = document_repo::find_by_id(&self.db, document_id)?
                .ok_or_else(|| WorkerError::DocumentMissing(document_id.clone()))?;
            if document.job_id != unit.job_id {
                return Err(WorkerError::ForeignDocument {
                    document_id: document_id.clone(),
                    job_id: unit.job_id.clone(),
                });
            }

            let result = self
                .stage
                .recognize(Path::new(&document.stored_path), &unit.languages)?;

            document_repo::record_recognition(
                &self.db,
                document_id,
                &RecognitionUpdate {
                    text: &result.text,
                    confidence: result.confidence,
                    method: result.method,
                    page_count: result.page_count,
                    processed_at: &Utc::now().to_rfc3339(),
                },
            )?;

            *processed += 1;
            *total_pages += result.page_count;
            let current = index as u32 + 1;
            debug!(
                document = current,
                method = %result.method,
                confidence = result.confidence,
                "Document recognized"
            );
            self.events
                .send(JobEvent::progress(&unit.job_id, current, total));
        }

        Ok(())
    }
}
