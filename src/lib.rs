//! # qcrun - Single-Job Execution Harness for HPC Compute Binaries
//!
//! qcrun runs one long-running quantum-chemistry compute job at a time:
//! it plans CPU resources (serial or MPI-hybrid), stages inputs into an
//! ephemeral scratch workspace, launches and monitors the process, and
//! classifies failures from the captured output log.
//!
//! ## Features
//!
//! - **Resource Planning**: serial vs. hybrid mode from cores and ranks,
//!   with an explicit, logged fallback when the MPI build is missing
//! - **Workspace Isolation**: per-job scratch directory with a fixed
//!   filename protocol and guaranteed cleanup on every exit path
//! - **Concurrent Monitoring**: liveness polling beside the blocked
//!   wait, so callers can render progress without blocking execution
//! - **Failure Diagnosis**: first-match-wins signature scan of the
//!   output log with category, explanation and remediation steps
//!
//! ## Quick Start
//!
//! ```no_run
//! use qcrun::config::{JobDescriptor, RunConfig};
//! use qcrun::progress::ProgressReporter;
//! use qcrun::runner::run_job;
//! use std::path::PathBuf;
//!
//! # async fn demo() -> qcrun::Result<()> {
//! let config = RunConfig::default();
//! let job = JobDescriptor {
//!     input: PathBuf::from("water.inp"),
//!     name: "water".to_string(),
//!     requested_ranks: 4,
//! };
//!
//! let report = run_job(&config, &job, ProgressReporter::new()).await?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Planning Without Side Effects
//!
//! ```no_run
//! use qcrun::config::RunConfig;
//! use qcrun::resources::ResourceAllocator;
//!
//! let config = RunConfig::default();
//! let allocator = ResourceAllocator::new(&config);
//! let plan = allocator.allocate(8, 4).unwrap();
//! assert_eq!(plan.threads_per_rank, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod diagnose;
pub mod error;
pub mod exec;
pub mod progress;
pub mod resources;
pub mod runner;
pub mod workspace;

// Re-export commonly used types
pub use config::{JobDescriptor, RunConfig};
pub use diagnose::{Diagnostic, FailureCategory};
pub use error::{QcrunError, Result};
pub use exec::{ExecutionResult, JobExecutor};
pub use resources::{ExecMode, ResourceAllocator, ResourcePlan};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use qcrun::prelude::*;
    //! ```

    pub use crate::config::{CliArgs, JobDescriptor, OutputFormat, RunConfig};
    pub use crate::diagnose::{classify, Diagnostic, FailureCategory};
    pub use crate::error::{QcrunError, Result};
    pub use crate::exec::{command_preview, ExecutionResult, JobExecutor, JobState};
    pub use crate::progress::ProgressReporter;
    pub use crate::resources::{ExecMode, ResourceAllocator, ResourcePlan};
    pub use crate::runner::{explain, run_job, RunReport};
    pub use crate::workspace::{Workspace, WorkspaceGuard, WorkspaceManager};
}
