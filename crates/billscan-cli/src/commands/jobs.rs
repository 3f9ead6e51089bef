use anyhow::bail;
use clap::Args;

use billscan::db::job_repo::{self, JobFilter};
use billscan::jobs::{self, lifecycle, JsonExporter};
use billscan::JobStatus;

use super::process::{extractor, run_job};
use super::Context;

#[derive(Args)]
pub struct JobArgs {
    /// Job id
    job_id: String,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only jobs in this status (pending, processing, completed, failed)
    #[arg(short, long)]
    status: Option<JobStatus>,

    #[arg(short, long, default_value_t = 20)]
    limit: u64,

    #[arg(long, default_value_t = 0)]
    offset: u64,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Job id
    job_id: String,

    /// Comma-separated field keys (see `billscan fields`)
    #[arg(short, long, value_delimiter = ',', required = true)]
    fields: Vec<String>,
}

pub fn list(args: ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let filter = JobFilter {
        status: args.status,
        limit: Some(args.limit),
        offset: Some(args.offset),
    };
    let (rows, total) = jobs::list_jobs(&ctx.db, &filter)?;

    for job in &rows {
        println!(
            "{}  {:<10}  {:>3} docs  {:>4} pages  {}",
            job.id, job.status.as_str(), job.total_documents, job.total_pages, job.created_at
        );
    }

    let mut counts = Vec::new();
    for status in [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ] {
        counts.push(format!("{} {}", job_repo::count_by_status(&ctx.db, status)?, status));
    }
    println!("{} of {} jobs ({})", rows.len(), total, counts.join(", "));
    Ok(())
}

pub fn show(args: JobArgs, ctx: &Context) -> anyhow::Result<()> {
    let extractor = extractor(ctx)?;
    let detail = jobs::job_detail(&ctx.db, extractor.registry(), &args.job_id)?;
    let job = &detail.job;

    println!("Job       {}", job.id);
    println!("Status    {}", job.status);
    println!("Created   {}", job.created_at);
    println!("Updated   {}", job.updated_at);
    println!("Pages     {}", job.total_pages);
    if let Some(ms) = job.processing_time_ms {
        println!("Took      {} ms", ms);
    }
    if let Some(error) = &job.error {
        println!("Error     {}", error);
    }

    for entry in &detail.documents {
        let doc = &entry.document;
        let method = doc.ocr_method.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
        let confidence = doc
            .ocr_confidence
            .map(|c| format!("{:.1}%", c))
            .unwrap_or_else(|| "-".to_string());
        println!();
        println!("[{}] {} ({} bytes, {} {})", doc.position, doc.original_name, doc.file_size, method, confidence);
        if !entry.detected_fields.is_empty() {
            println!("    detected: {}", entry.detected_fields.join(", "));
        }
        for field in &entry.extractions {
            println!(
                "    {:<16} {:<30} {:>3}  {}",
                field.field_label,
                field.value.as_deref().unwrap_or("-"),
                field.confidence,
                field.method
            );
        }
    }

    for export in &detail.exports {
        println!();
        println!("Exported  {} ({} bytes, {})", export.file_path, export.file_size, export.exported_at);
    }

    Ok(())
}

pub async fn extract(args: ExtractArgs, ctx: &Context) -> anyhow::Result<()> {
    print_extraction(ctx, &args.job_id, &args.fields).await
}

pub async fn print_extraction(ctx: &Context, job_id: &str, fields: &[String]) -> anyhow::Result<()> {
    let extractor = extractor(ctx)?;
    let results = jobs::run_extraction(&ctx.db, &extractor, job_id, fields).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

pub fn export(args: JobArgs, ctx: &Context) -> anyhow::Result<()> {
    let outcome = jobs::export_job(&ctx.db, &JsonExporter, &ctx.export_dir(), &args.job_id)?;
    println!(
        "Exported {} fields from {} documents to {} ({} bytes)",
        outcome.field_count,
        outcome.document_count,
        outcome.path.display(),
        outcome.file_size
    );
    Ok(())
}

pub async fn retry(args: JobArgs, ctx: &Context) -> anyhow::Result<()> {
    let document_ids = lifecycle::retry(&ctx.db, &args.job_id)?;
    println!("Job {} reset, reprocessing {} documents", args.job_id, document_ids.len());

    let outcome = run_job(ctx, args.job_id, document_ids, Vec::new()).await?;
    if !outcome.succeeded() {
        bail!(
            "job {} failed again: {}",
            outcome.job_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub fn delete(args: JobArgs, ctx: &Context) -> anyhow::Result<()> {
    lifecycle::delete(&ctx.db, &args.job_id)?;
    println!("Job {} deleted", args.job_id);
    Ok(())
}
