//! Compute process execution
//!
//! The executor takes an immutable `ResourcePlan` and a staged
//! `Workspace` and drives one job through its state machine:
//! `Idle → Validated → Staged → Running → {Completed | Failed}`.
//! Both end states are terminal; retries are a caller concern.
//!
//! The command line is built from explicit arguments only. Input and
//! output use fixed workspace-relative names wired up as redirected
//! file handles, so no untrusted string ever reaches a shell.

use crate::config::JobDescriptor;
use crate::diagnose::{classify, Diagnostic};
use crate::error::{IoResultExt, QcrunError, Result};
use crate::exec::monitor::monitor_process;
use crate::progress::ProgressReporter;
use crate::resources::{is_executable, ExecMode, ResourcePlan};
use crate::workspace::{Workspace, INPUT_FILE, OUTPUT_FILE};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Per-job execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Nothing checked yet
    Idle,
    /// Pre-flight checks passed
    Validated,
    /// Workspace inputs confirmed in place
    Staged,
    /// Compute process is alive
    Running,
    /// Terminal: exit code 0
    Completed,
    /// Terminal: non-zero exit
    Failed,
}

/// Terminal result of one compute run
///
/// A non-zero exit is represented here, not as an error: a failed
/// compute run is an expected, analyzable outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Process exit code (128 + signal number for signal deaths)
    pub exit_code: i32,
    /// Wall-clock duration of the run
    pub wall_time: Duration,
    /// Location of the captured output log
    pub output_path: PathBuf,
    /// Failure diagnosis, present exactly when `exit_code != 0`
    pub diagnostic: Option<Diagnostic>,
    /// Planning warnings carried into the report (fallback, oversubscription)
    pub warnings: Vec<String>,
}

impl ExecutionResult {
    /// Whether the compute run succeeded
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Print the run summary to the console
    pub fn print_summary(&self) {
        println!("\n=== Run Summary ===");
        println!("Exit code:  {}", self.exit_code);
        println!(
            "Wall time:  {}",
            humantime::format_duration(Duration::from_secs(self.wall_time.as_secs()))
        );
        println!("Output:     {}", self.output_path.display());
        for warning in &self.warnings {
            println!("Warning:    {}", warning);
        }
        if let Some(diagnostic) = &self.diagnostic {
            diagnostic.print_summary();
        }
    }
}

/// Runs one compute job to completion
pub struct JobExecutor {
    plan: ResourcePlan,
    launcher: String,
    progress: Arc<ProgressReporter>,
    state: JobState,
}

impl JobExecutor {
    /// Create an executor for the given plan
    ///
    /// `launcher` is the multi-process launcher command used in hybrid
    /// mode (ignored for serial plans).
    pub fn new(plan: ResourcePlan, launcher: impl Into<String>) -> Self {
        Self {
            plan,
            launcher: launcher.into(),
            progress: Arc::new(ProgressReporter::disabled()),
            state: JobState::Idle,
        }
    }

    /// Set the progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Current state of the job
    pub fn state(&self) -> JobState {
        self.state
    }

    fn set_state(&mut self, state: JobState) {
        debug!(from = ?self.state, to = ?state, "job state transition");
        self.state = state;
    }

    /// Run the job to completion inside `workspace`
    ///
    /// Waits for the compute process while a concurrent monitor task
    /// polls liveness; the monitor is always joined before returning.
    /// On non-zero exit the output log is classified and the resulting
    /// diagnostic attached — that step can never fail.
    pub async fn run(
        &mut self,
        workspace: &Workspace,
        job: &JobDescriptor,
    ) -> Result<ExecutionResult> {
        self.preflight(workspace)?;

        let input_path = workspace.file(INPUT_FILE);
        let output_path = workspace.file(OUTPUT_FILE);

        let stdin = File::open(&input_path).with_path(&input_path)?;
        let stdout = File::create(&output_path).with_path(&output_path)?;
        let stderr = stdout.try_clone().with_path(&output_path)?;

        let mut command = self.build_command(workspace);
        command
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let preview = command_preview(&self.plan, &self.launcher);
        info!(command = preview.as_str(), "launching compute process");

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| QcrunError::Spawn {
            command: preview.clone(),
            source,
        })?;
        self.set_state(JobState::Running);
        self.progress.job_started(&job.name, self.plan.mode.name());

        // Liveness monitor runs beside the blocked wait; completion is
        // signalled through the oneshot and the task joined before we
        // return on any path.
        let (done_tx, done_rx) = oneshot::channel();
        let monitor = child.id().map(|pid| {
            tokio::spawn(monitor_process(
                pid,
                job.name.clone(),
                Arc::clone(&self.progress),
                done_rx,
            ))
        });

        let wait_result = child.wait().await;
        let _ = done_tx.send(());
        if let Some(handle) = monitor {
            let _ = handle.await;
        }
        let wall_time = start.elapsed();

        let status = wait_result.with_path(&self.plan.executable)?;
        let exit_code = exit_code_of(status);

        let diagnostic = if exit_code == 0 {
            self.set_state(JobState::Completed);
            self.progress.finish(&format!("{} completed", job.name));
            None
        } else {
            self.set_state(JobState::Failed);
            self.progress
                .finish(&format!("{} failed (exit {})", job.name, exit_code));
            warn!(exit_code, "compute process failed; classifying output");
            Some(classify(&output_path))
        };

        Ok(ExecutionResult {
            exit_code,
            wall_time,
            output_path,
            diagnostic,
            warnings: self.plan.notes.clone(),
        })
    }

    /// Defense-in-depth checks, independent of what the allocator
    /// already verified
    fn preflight(&mut self, workspace: &Workspace) -> Result<()> {
        if !is_executable(&self.plan.executable) {
            return Err(QcrunError::NotExecutable(self.plan.executable.clone()));
        }
        if self.plan.mode == ExecMode::Hybrid {
            if self.plan.rank_count < 1 {
                return Err(QcrunError::validation(format!(
                    "hybrid mode requires a positive rank count, got {}",
                    self.plan.rank_count
                )));
            }
            if !launcher_exists(&self.launcher) {
                return Err(QcrunError::LauncherNotFound(self.launcher.clone()));
            }
        }
        self.set_state(JobState::Validated);

        let input = workspace.file(INPUT_FILE);
        if !input.is_file() {
            return Err(QcrunError::RequiredInputMissing(input));
        }
        self.set_state(JobState::Staged);
        Ok(())
    }

    /// Build the launch command with explicit arguments and the
    /// plan-derived child environment
    fn build_command(&self, workspace: &Workspace) -> Command {
        let mut command = match self.plan.mode {
            ExecMode::Serial => Command::new(&self.plan.executable),
            ExecMode::Hybrid => {
                let mut command = Command::new(&self.launcher);
                command
                    .arg("-np")
                    .arg(self.plan.rank_count.to_string())
                    .arg(&self.plan.executable);
                command
            }
        };
        command.current_dir(&workspace.root);
        command.envs(self.plan.env_vars());
        command.kill_on_drop(true);
        command
    }
}

/// Human-readable command line for `--explain` output and logs
pub fn command_preview(plan: &ResourcePlan, launcher: &str) -> String {
    match plan.mode {
        ExecMode::Serial => format!(
            "{} < {} > {}",
            plan.executable.display(),
            INPUT_FILE,
            OUTPUT_FILE
        ),
        ExecMode::Hybrid => format!(
            "{} -np {} {} < {} > {}",
            launcher,
            plan.rank_count,
            plan.executable.display(),
            INPUT_FILE,
            OUTPUT_FILE
        ),
    }
}

/// Check the hybrid launcher can actually be invoked: explicit paths
/// are checked directly, bare command names are searched on PATH
fn launcher_exists(launcher: &str) -> bool {
    let path = Path::new(launcher);
    if path.components().count() > 1 {
        return is_executable(path);
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(launcher))))
        .unwrap_or(false)
}

/// Map an exit status to a single code, folding signal deaths into the
/// conventional 128+N range
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
