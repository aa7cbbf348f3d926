//! Configuration settings for qcrun
//!
//! Defines all configuration options, CLI arguments, and defaults
//! for a compute job run.

use crate::error::{QcrunError, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// qcrun - Single-job execution harness for quantum-chemistry compute binaries
#[derive(Parser, Debug, Clone)]
#[command(name = "qcrun")]
#[command(author = "qcrun Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run one compute job with managed resources and scratch isolation")]
#[command(long_about = r#"
qcrun launches a single long-running compute job (serial or MPI-hybrid
build of the compute binary), isolates its I/O in an ephemeral scratch
workspace, monitors it while it runs, and classifies failures from the
captured output log.

Examples:
  qcrun water.inp                      # Serial run, all cores as threads
  qcrun slab.inp --ranks 4             # Hybrid run, 4 MPI ranks
  qcrun slab.inp --ranks 4 --explain   # Print the plan, touch nothing
  qcrun analyze --ranks 8              # Show the resource plan table
"#)]
pub struct CliArgs {
    /// Input file for the compute binary (e.g. job.inp)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Job name prefix (defaults to the input file stem)
    #[arg(short = 'N', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Requested MPI rank count (0 or 1 = serial)
    #[arg(short = 'r', long, default_value = "0", value_name = "NUM", allow_negative_numbers = true)]
    pub ranks: i64,

    /// Total cores to plan for (0 = auto-detect)
    #[arg(long, default_value = "0", value_name = "NUM")]
    pub cores: usize,

    /// Print the resource plan and command line without running anything
    #[arg(short = 'e', long)]
    pub explain: bool,

    /// Scratch base directory for ephemeral workspaces
    #[arg(long, env = "QCRUN_SCRATCH", value_name = "DIR")]
    pub scratch: Option<PathBuf>,

    /// Serial compute executable
    #[arg(long, env = "QCRUN_SERIAL_EXE", value_name = "PATH")]
    pub serial_exe: Option<PathBuf>,

    /// Hybrid (MPI) compute executable
    #[arg(long, env = "QCRUN_HYBRID_EXE", value_name = "PATH")]
    pub hybrid_exe: Option<PathBuf>,

    /// Multi-process launcher for hybrid mode
    #[arg(long, env = "QCRUN_LAUNCHER", default_value = "mpirun", value_name = "CMD")]
    pub launcher: String,

    /// Show live progress while the job runs
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output format for the run report
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show detected cores and the resource plan for a rank count
    #[command(name = "analyze")]
    Analyze {
        /// Rank count to plan for (0 or 1 = serial)
        #[arg(short = 'r', long, default_value = "0", allow_negative_numbers = true)]
        ranks: i64,
    },
}

/// Output format for run reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text summary
    Text,
    /// Machine-readable JSON report
    Json,
}

/// Runtime configuration resolved from CLI arguments and environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Base directory under which all workspaces are created
    pub scratch_base: PathBuf,
    /// Prefix for workspace directory names
    pub workspace_prefix: String,
    /// Serial compute executable
    pub serial_exe: PathBuf,
    /// Hybrid (MPI) compute executable
    pub hybrid_exe: PathBuf,
    /// Multi-process launcher command for hybrid mode
    pub launcher: String,
    /// Total cores to plan for (0 = auto-detect)
    pub total_cores: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scratch_base: std::env::temp_dir().join("qcrun"),
            workspace_prefix: "qcrun".to_string(),
            serial_exe: PathBuf::from("/opt/qcx/bin/qcx"),
            hybrid_exe: PathBuf::from("/opt/qcx/bin/qcx-mpi"),
            launcher: "mpirun".to_string(),
            total_cores: 0,
        }
    }
}

impl RunConfig {
    /// Build configuration from parsed CLI arguments
    pub fn from_cli(args: &CliArgs) -> Self {
        let defaults = Self::default();
        Self {
            scratch_base: args.scratch.clone().unwrap_or(defaults.scratch_base),
            workspace_prefix: defaults.workspace_prefix,
            serial_exe: args.serial_exe.clone().unwrap_or(defaults.serial_exe),
            hybrid_exe: args.hybrid_exe.clone().unwrap_or(defaults.hybrid_exe),
            launcher: args.launcher.clone(),
            total_cores: args.cores,
        }
    }

    /// Resolve the total core count, auto-detecting when unset
    pub fn resolve_cores(&self) -> usize {
        if self.total_cores > 0 {
            self.total_cores
        } else {
            num_cpus::get()
        }
    }
}

/// Description of one compute job, created by the caller at invocation
/// time and immutable afterwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Input file for the compute binary
    pub input: PathBuf,
    /// Job name prefix used for workspace and artifact naming
    pub name: String,
    /// Requested MPI rank count (0 or 1 = serial)
    pub requested_ranks: i64,
}

impl JobDescriptor {
    /// Build a job descriptor from CLI arguments
    ///
    /// The job name defaults to the input file stem when not given
    /// explicitly.
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let input = args
            .input
            .clone()
            .ok_or_else(|| QcrunError::validation("an input file is required"))?;

        let name = match &args.name {
            Some(name) if !name.is_empty() => name.clone(),
            Some(_) => return Err(QcrunError::validation("job name must not be empty")),
            None => input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    QcrunError::validation(format!("cannot derive a job name from '{}'", input.display()))
                })?,
        };

        // The name becomes part of the workspace directory name, so it
        // must stay a single path component
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(QcrunError::validation(format!(
                "job name '{}' must be a plain name without path separators",
                name
            )));
        }

        Ok(Self {
            input,
            name,
            requested_ranks: args.ranks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_job_descriptor_name_from_stem() {
        let args = CliArgs::parse_from(["qcrun", "geom/water.inp"]);
        let job = JobDescriptor::from_cli(&args).unwrap();
        assert_eq!(job.name, "water");
        assert_eq!(job.requested_ranks, 0);
    }

    #[test]
    fn test_job_descriptor_explicit_name() {
        let args = CliArgs::parse_from(["qcrun", "water.inp", "--name", "relax01", "-r", "4"]);
        let job = JobDescriptor::from_cli(&args).unwrap();
        assert_eq!(job.name, "relax01");
        assert_eq!(job.requested_ranks, 4);
    }

    #[test]
    fn test_job_descriptor_rejects_traversal_name() {
        for name in ["../../../victim", "a/b", "..", "."] {
            let args = CliArgs::parse_from(["qcrun", "water.inp", "--name", name]);
            let err = JobDescriptor::from_cli(&args).unwrap_err();
            assert!(err.is_validation(), "name '{}' must be rejected", name);
        }
    }

    #[test]
    fn test_job_descriptor_requires_input() {
        let args = CliArgs::parse_from(["qcrun"]);
        let err = JobDescriptor::from_cli(&args).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_negative_ranks_parse_but_flag_validation_later() {
        // Validation of the sign happens in the allocator, not in clap,
        // so the error surfaces as a ValidationError rather than a
        // usage error.
        let args = CliArgs::parse_from(["qcrun", "water.inp", "--ranks", "-2"]);
        assert_eq!(args.ranks, -2);
    }

    #[test]
    fn test_run_config_cli_overrides() {
        let args = CliArgs::parse_from([
            "qcrun",
            "water.inp",
            "--scratch",
            "/lscratch",
            "--serial-exe",
            "/usr/bin/qcx",
            "--cores",
            "12",
        ]);
        let config = RunConfig::from_cli(&args);
        assert_eq!(config.scratch_base, PathBuf::from("/lscratch"));
        assert_eq!(config.serial_exe, PathBuf::from("/usr/bin/qcx"));
        assert_eq!(config.resolve_cores(), 12);
    }

    #[test]
    fn test_resolve_cores_auto_detect() {
        let config = RunConfig::default();
        assert!(config.resolve_cores() > 0);
    }
}
