use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::db::Database;
use crate::error::WorkerError;
use crate::events::JobEventChannel;
use crate::recognition::RecognitionStage;
use crate::worker::processor::BatchProcessor;
use crate::worker::unit::{TaskHandle, TaskQueue, UnitReport, WorkUnit};

/// Builds the recognition stage for one worker thread.
pub type StageBuilder = Arc<dyn Fn() -> RecognitionStage + Send + Sync>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed set of threads, each with its own `BatchProcessor`.
pub struct WorkerPool {
    unit_sender: Sender<WorkUnit>,
    report_receiver: Receiver<UnitReport>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(
        db: Database,
        events: JobEventChannel,
        build_stage: StageBuilder,
        worker_count: usize,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be at least 1".to_string(),
            ));
        }

        let (unit_sender, unit_receiver) = bounded::<WorkUnit>(worker_count * 2);
        let (report_sender, report_receiver) = unbounded::<UnitReport>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let unit_rx = unit_receiver.clone();
            let report_tx = report_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let db = db.clone();
            let events = events.clone();
            let build_stage = Arc::clone(&build_stage);

            let handle = thread::Builder::new()
                .name(format!("billscan-worker-{}", worker_id))
                .spawn(move || {
                    let processor = BatchProcessor::new(db, events, build_stage());
                    run_worker(worker_id, processor, unit_rx, report_tx, shutdown_flag);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            unit_sender,
            report_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, unit: WorkUnit) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.unit_sender.try_send(unit).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::QueueFull,
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })
    }

    pub fn recv_report(&self) -> Option<UnitReport> {
        self.report_receiver.recv().ok()
    }

    pub fn recv_report_timeout(&self, timeout: Duration) -> Option<UnitReport> {
        self.report_receiver.recv_timeout(timeout).ok()
    }

    /// Stops workers from picking up new units. A unit already being
    /// processed runs to completion.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn wait(self) {
        drop(self.unit_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

impl TaskQueue for WorkerPool {
    fn enqueue(&self, unit: WorkUnit) -> Result<TaskHandle, WorkerError> {
        let handle = TaskHandle {
            job_id: unit.job_id.clone(),
            document_count: unit.document_ids.len(),
        };
        self.submit(unit)?;
        debug!("Enqueued job {}", handle.job_id);
        Ok(handle)
    }
}

fn run_worker(
    worker_id: usize,
    mut processor: BatchProcessor,
    unit_receiver: Receiver<WorkUnit>,
    report_sender: Sender<UnitReport>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match unit_receiver.recv_timeout(POLL_INTERVAL) {
            Ok(unit) => {
                debug!("Worker {} processing job {}", worker_id, unit.job_id);

                let outcome = processor.process(&unit);
                if let Err(e) = &outcome {
                    warn!("Worker {} could not process job {}: {}", worker_id, unit.job_id, e);
                }

                let report = UnitReport {
                    job_id: unit.job_id,
                    outcome,
                };
                if let Err(e) = report_sender.send(report) {
                    error!("Worker {} failed to send report: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} unit channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
