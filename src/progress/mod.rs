//! Progress reporting module
//!
//! Live status for a running job, fed by the executor's monitor task.

mod reporter;

pub use reporter::ProgressReporter;
