//! Command-line driver for the billscan document pipeline.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use billscan::logging::{self, LoggingOptions};

use commands::{fields, jobs, process, Context};

/// Billing document OCR with confidence-scored field extraction
#[derive(Parser)]
#[command(name = "billscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit documents, recognize them and stream job events
    Process(process::ProcessArgs),

    /// List the extractable fields
    Fields,

    /// List jobs
    Jobs(jobs::ListArgs),

    /// Show a job with its documents and extractions
    Show(jobs::JobArgs),

    /// Extract fields from every document of a processed job
    Extract(jobs::ExtractArgs),

    /// Export a job's extracted fields as JSON
    Export(jobs::JobArgs),

    /// Reset a finished job and process it again
    Retry(jobs::JobArgs),

    /// Delete a job, its uploads and its exports
    Delete(jobs::JobArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&LoggingOptions {
        verbosity: cli.verbose,
        json: cli.json_logs,
    })?;

    if let Commands::Fields = cli.command {
        fields::run();
        return Ok(());
    }

    let ctx = Context::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process(args) => process::run(args, &ctx).await,
        Commands::Fields => Ok(()),
        Commands::Jobs(args) => jobs::list(args, &ctx),
        Commands::Show(args) => jobs::show(args, &ctx),
        Commands::Extract(args) => jobs::extract(args, &ctx).await,
        Commands::Export(args) => jobs::export(args, &ctx),
        Commands::Retry(args) => jobs::retry(args, &ctx).await,
        Commands::Delete(args) => jobs::delete(args, &ctx),
    }
}
