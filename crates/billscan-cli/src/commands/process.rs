use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::Args;
use log::info;

use billscan::events::{spawn_fanout, ChannelListener};
use billscan::jobs::{self, Upload};
use billscan::worker::{StageBuilder, UnitOutcome};
use billscan::{
    ConnectionRegistry, FieldExtractor, JobEventChannel, RecognitionStage, TaskQueue, WorkUnit,
    WorkerPool,
};

use super::Context;

#[derive(Args)]
pub struct ProcessArgs {
    /// Documents to submit as one job (PDF or image)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// OCR language codes (default: from config)
    #[arg(short, long, value_delimiter = ',')]
    lang: Vec<String>,

    /// Fields to extract once recognition completes
    #[arg(short, long, value_delimiter = ',')]
    fields: Vec<String>,
}

pub async fn run(args: ProcessArgs, ctx: &Context) -> anyhow::Result<()> {
    let uploads = args
        .files
        .iter()
        .map(Upload::from_path)
        .collect::<Result<Vec<_>, _>>()?;

    let submission = jobs::submit(&ctx.db, &ctx.upload_dir(), &uploads)?;
    println!("Job {} submitted ({} documents)", submission.job_id, uploads.len());

    let outcome = run_job(ctx, submission.job_id.clone(), submission.document_ids, args.lang).await?;
    if !outcome.succeeded() {
        bail!(
            "job {} failed: {}",
            outcome.job_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    if !args.fields.is_empty() {
        super::jobs::print_extraction(ctx, &submission.job_id, &args.fields).await?;
    }

    Ok(())
}

/// Processes one job on a fresh worker pool. Job events reach stdout as
/// JSON lines through a listener registered with the fan-out task.
pub async fn run_job(
    ctx: &Context,
    job_id: String,
    document_ids: Vec<String>,
    languages: Vec<String>,
) -> anyhow::Result<UnitOutcome> {
    let languages = if languages.is_empty() {
        ctx.config.ocr.languages.clone()
    } else {
        languages
    };

    let events = JobEventChannel::new(ctx.config.events.capacity);
    let registry = Arc::new(ConnectionRegistry::new());
    let (listener, mut payloads) = ChannelListener::new();
    registry.connect(Arc::new(listener));
    let fanout = spawn_fanout(&events, Arc::clone(&registry));

    let ocr = ctx.config.ocr.clone();
    let build_stage: StageBuilder = Arc::new(move || RecognitionStage::from_config(&ocr));
    // One job at a time from the command line.
    let pool = WorkerPool::new(ctx.db.clone(), events, build_stage, 1)?;
    pool.enqueue(WorkUnit::new(job_id.clone(), document_ids, languages))?;

    let mut report = tokio::task::spawn_blocking(move || {
        let report = pool.recv_report();
        pool.shutdown();
        pool.wait();
        report
    });

    let report = loop {
        tokio::select! {
            biased;
            Some(payload) = payloads.recv() => println!("{}", payload),
            report = &mut report => break report.context("worker task panicked")?,
        }
    };

    // The pool has dropped its senders, so the fan-out drains and exits.
    fanout.await.context("event fan-out task panicked")?;
    while let Ok(payload) = payloads.try_recv() {
        println!("{}", payload);
    }

    let report = report.context("worker pool stopped without a report")?;
    let outcome = report.outcome?;
    info!(
        "Job {} {} in {} ms",
        outcome.job_id, outcome.status, outcome.processing_time_ms
    );
    Ok(outcome)
}

pub fn extractor(ctx: &Context) -> anyhow::Result<FieldExtractor> {
    Ok(FieldExtractor::from_config(&ctx.config.llm)?)
}
