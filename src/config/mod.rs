//! Configuration module
//!
//! CLI argument definitions and runtime configuration for qcrun.

mod settings;

pub use settings::{CliArgs, Commands, JobDescriptor, OutputFormat, RunConfig};
