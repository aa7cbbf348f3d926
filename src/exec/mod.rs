//! Job execution module
//!
//! Builds the launch command from a resource plan, spawns the compute
//! process with its I/O redirected inside the workspace, monitors it
//! concurrently, and captures the terminal result.

mod executor;
mod monitor;

pub use executor::{command_preview, ExecutionResult, JobExecutor, JobState};
