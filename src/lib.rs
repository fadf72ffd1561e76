// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{PipelineFile, load_and_validate};
use crate::dag::DagGraph;
use crate::engine::{ExecutionOptions, Orchestrator};
use crate::exec::{HandlerRegistry, SHELL_JOB_TYPE, ShellHandler};
use crate::types::ExecutionStatus;

pub use crate::engine::{Execution, ExecutionHandle, JobState};
pub use crate::errors::{JobError, JobdagError, RegistryError, ValidationError};
pub use crate::exec::{ExecutionContext, JobHandler};
pub use crate::types::{JobConfig, JobStatus, RetryConfig};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading and validation
/// - the handler registry (built-in `shell` type)
/// - the orchestrator
/// - Ctrl-C handling (cooperative cancellation)
///
/// The final snapshot is printed to stdout as JSON. Anything other than a
/// fully completed execution is returned as an error.
pub async fn run(args: CliArgs) -> Result<()> {
    let pipeline = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&pipeline)?;
        return Ok(());
    }

    let parallelism = args
        .parallelism
        .map(|p| p as usize)
        .unwrap_or_else(|| pipeline.parallelism());

    let mut registry = HandlerRegistry::new();
    registry.register(SHELL_JOB_TYPE, ShellHandler)?;
    let orchestrator = Orchestrator::new(registry);

    let name = pipeline.name().to_string();
    let options = ExecutionOptions::with_parallelism(parallelism).on_progress(|done, total| {
        info!(done, total, "pipeline progress");
    });
    let handle = orchestrator.submit(name, pipeline.into_jobs(), options)?;

    // Ctrl-C → stop dispatching, let running jobs finish.
    {
        let cancel = handle.cancellation_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl+C received; cancelling execution");
            cancel.cancel();
        });
    }

    let execution = handle.wait().await?;
    println!("{}", serde_json::to_string_pretty(&execution)?);

    if execution.status != ExecutionStatus::Completed {
        bail!(
            "execution '{}' finished with status {} (failed: {:?}, skipped: {:?})",
            execution.name,
            execution.status,
            execution.ids_with_status(JobStatus::Failed),
            execution.ids_with_status(JobStatus::Skipped),
        );
    }

    Ok(())
}

/// Dry-run output: jobs in dependency order with their settings.
fn print_dry_run(pipeline: &PipelineFile) -> Result<()> {
    let graph = DagGraph::build(pipeline.jobs())?;

    println!("jobdag dry-run");
    println!("  execution.name = {}", pipeline.name());
    println!("  execution.parallelism = {}", pipeline.parallelism());
    println!();

    println!("jobs ({}), in dependency order:", pipeline.jobs().len());
    for id in graph.topological_order() {
        let Some(job) = pipeline.jobs().iter().find(|j| j.id == id) else {
            continue;
        };
        println!("  - {} ({})", job.id, job.job_type);
        if job.name != job.id {
            println!("      name: {}", job.name);
        }
        if !job.depends_on.is_empty() {
            println!("      depends_on: {:?}", job.depends_on);
        }
        if !job.config.is_null() {
            println!("      config: {}", job.config);
        }
        if job.retry.max_retries > 0 {
            println!(
                "      retry: {} x {} ms (backoff x{})",
                job.retry.max_retries, job.retry.retry_delay_ms, job.retry.backoff_multiplier
            );
        }
        if let Some(ms) = job.timeout_ms {
            println!("      timeout_ms: {ms}");
        }
    }

    Ok(())
}
