//! Single-job run orchestration
//!
//! Wires the subsystems together in the canonical order: allocate →
//! create/stage workspace → execute (with concurrent monitoring) →
//! retrieve artifacts → cleanup. The cleanup guard is armed right
//! after workspace creation, so staging errors, execution failures,
//! panics and interrupts all leave the scratch base empty.

use crate::config::{JobDescriptor, RunConfig};
use crate::error::Result;
use crate::exec::{command_preview, ExecutionResult, JobExecutor};
use crate::progress::ProgressReporter;
use crate::resources::{ResourceAllocator, ResourcePlan};
use crate::workspace::{WorkspaceGuard, WorkspaceManager, OPT_FILE, OUTPUT_FILE, RESTART_FILE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Full record of one job run, for reporting
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// The job as requested
    pub job: JobDescriptor,
    /// The plan the job ran under
    pub plan: ResourcePlan,
    /// Terminal execution result
    pub result: ExecutionResult,
    /// Artifacts copied back out of the workspace
    pub retrieved: Vec<PathBuf>,
    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl RunReport {
    /// Print the report as human-readable text
    pub fn print_summary(&self) {
        self.result.print_summary();
        if !self.retrieved.is_empty() {
            println!("\nRetrieved artifacts:");
            for path in &self.retrieved {
                println!("  {}", path.display());
            }
        }
    }
}

/// Run one compute job end to end
///
/// Validation and resource errors abort before spawn and propagate as
/// hard errors; a non-zero compute exit comes back as an `Ok` report
/// carrying its diagnostic. The workspace is removed on every path.
pub async fn run_job(
    config: &RunConfig,
    job: &JobDescriptor,
    progress: ProgressReporter,
) -> Result<RunReport> {
    let started_at = Utc::now();

    let allocator = ResourceAllocator::new(config);
    let plan = allocator.allocate(config.resolve_cores(), job.requested_ranks)?;

    let manager = WorkspaceManager::new(config);
    // Process id keeps concurrent invocations on the same host apart.
    let job_id = format!("{}_{}", job.name, std::process::id());
    let workspace = manager.create(&job_id)?;
    let mut guard = WorkspaceGuard::new(&manager, workspace);

    let staged = manager.stage(
        guard.workspace_mut(),
        &[job.input.clone()],
        &optional_inputs(job),
    )?;
    info!(files = staged.len(), "staging complete");

    let mut executor =
        JobExecutor::new(plan.clone(), config.launcher.as_str()).with_progress(progress);
    let result = executor.run(guard.workspace(), job).await?;

    let retrieved = manager.retrieve(guard.workspace(), &result_map(job));
    info!(
        exit_code = result.exit_code,
        retrieved = retrieved.len(),
        "run finished"
    );

    Ok(RunReport {
        job: job.clone(),
        plan,
        result,
        retrieved,
        started_at,
    })
}

/// Compute the plan and command line without touching the filesystem
/// or spawning anything
///
/// This is the `--explain` path: the only I/O is the allocator's
/// executable-existence check.
pub fn explain(config: &RunConfig, job: &JobDescriptor) -> Result<(ResourcePlan, String)> {
    let allocator = ResourceAllocator::new(config);
    let plan = allocator.allocate(config.resolve_cores(), job.requested_ranks)?;
    let preview = command_preview(&plan, &config.launcher);
    Ok((plan, preview))
}

/// Optional companion inputs staged next to the main deck when present
fn optional_inputs(job: &JobDescriptor) -> Vec<PathBuf> {
    vec![
        job.input.with_extension("restart"),
        job.input.with_extension("opt"),
    ]
}

/// Fixed mapping from workspace artifacts to caller-facing names,
/// written next to the input file
fn result_map(job: &JobDescriptor) -> Vec<(String, PathBuf)> {
    let dir = job
        .input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    vec![
        (OUTPUT_FILE.to_string(), dir.join(format!("{}.out", job.name))),
        (RESTART_FILE.to_string(), dir.join(format!("{}.restart", job.name))),
        (OPT_FILE.to_string(), dir.join(format!("{}.opt", job.name))),
    ]
}
