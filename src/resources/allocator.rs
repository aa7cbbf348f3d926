//! Resource plan computation
//!
//! Given the total available cores and a requested parallelism degree,
//! decides between a serial run (one process, all cores as threads) and
//! a hybrid run (N MPI ranks, cores split evenly across ranks), and
//! picks the matching executable variant. The plan is computed once,
//! is immutable afterwards, and carries the spawn-time environment as
//! data — the caller's process environment is never touched.

use crate::config::RunConfig;
use crate::error::{QcrunError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Execution mode for a compute job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// One process, all planned cores as OpenMP threads
    Serial,
    /// Multiple MPI ranks, each with its share of cores as threads
    Hybrid,
}

impl ExecMode {
    /// Short name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            ExecMode::Serial => "serial",
            ExecMode::Hybrid => "hybrid",
        }
    }
}

/// Immutable execution plan for one compute job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// Execution mode
    pub mode: ExecMode,
    /// Executable variant that will be launched
    pub executable: PathBuf,
    /// MPI rank count (0 for serial runs)
    pub rank_count: usize,
    /// OpenMP threads per rank
    pub threads_per_rank: usize,
    /// Total cores the plan was computed against
    pub total_cores: usize,
    /// Observable planning notes (fallback, oversubscription)
    pub notes: Vec<String>,
}

impl ResourcePlan {
    /// Environment variables for the spawned process, derived solely
    /// from this plan
    ///
    /// These are applied to the child process at spawn time only. The
    /// stack-size hint matters for deep Fortran call chains in the
    /// compute binary; the pinning variables are hybrid-only so a
    /// serial run can float across the whole socket.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("OMP_NUM_THREADS".to_string(), self.threads_per_rank.to_string()),
            ("OMP_STACKSIZE".to_string(), "512m".to_string()),
        ];
        if self.mode == ExecMode::Hybrid {
            vars.push(("OMP_PLACES".to_string(), "cores".to_string()));
            vars.push(("OMP_PROC_BIND".to_string(), "close".to_string()));
        }
        vars
    }

    /// True when the plan was downgraded or floored during allocation
    pub fn has_warnings(&self) -> bool {
        !self.notes.is_empty()
    }
}

/// Computes resource plans against a runtime configuration
pub struct ResourceAllocator<'a> {
    config: &'a RunConfig,
}

impl<'a> ResourceAllocator<'a> {
    /// Create an allocator over the given configuration
    pub fn new(config: &'a RunConfig) -> Self {
        Self { config }
    }

    /// Compute the execution plan for `requested_ranks` on `total_cores`
    ///
    /// Deterministic given its inputs; the only I/O is the executable
    /// existence check. `requested_ranks <= 1` selects a serial run with
    /// all cores as threads; anything larger selects a hybrid run with
    /// `max(1, total_cores / requested_ranks)` threads per rank. When
    /// the hybrid build is missing but the serial one exists, the plan
    /// is downgraded to serial with a logged warning instead of failing.
    pub fn allocate(&self, total_cores: usize, requested_ranks: i64) -> Result<ResourcePlan> {
        if requested_ranks < 0 {
            return Err(QcrunError::validation(format!(
                "rank count must be a non-negative integer, got {}",
                requested_ranks
            )));
        }
        if total_cores == 0 {
            return Err(QcrunError::validation("total core count must be at least 1"));
        }
        let requested_ranks = requested_ranks as usize;

        let mut plan = if requested_ranks <= 1 {
            ResourcePlan {
                mode: ExecMode::Serial,
                executable: self.config.serial_exe.clone(),
                rank_count: 0,
                threads_per_rank: total_cores,
                total_cores,
                notes: Vec::new(),
            }
        } else {
            let threads = (total_cores / requested_ranks).max(1);
            let mut notes = Vec::new();
            if requested_ranks > total_cores {
                let note = format!(
                    "{} ranks oversubscribe {} cores; threads per rank floored to 1",
                    requested_ranks, total_cores
                );
                warn!("{}", note);
                notes.push(note);
            }
            ResourcePlan {
                mode: ExecMode::Hybrid,
                executable: self.config.hybrid_exe.clone(),
                rank_count: requested_ranks,
                threads_per_rank: threads,
                total_cores,
                notes,
            }
        };

        self.resolve_executable(&mut plan)?;
        debug!(
            mode = plan.mode.name(),
            ranks = plan.rank_count,
            threads = plan.threads_per_rank,
            exe = %plan.executable.display(),
            "resource plan computed"
        );
        Ok(plan)
    }

    /// Verify the selected executable, downgrading hybrid to serial
    /// when only the serial build is installed
    fn resolve_executable(&self, plan: &mut ResourcePlan) -> Result<()> {
        if is_executable(&plan.executable) {
            return Ok(());
        }

        if plan.mode == ExecMode::Hybrid && is_executable(&self.config.serial_exe) {
            let note = format!(
                "hybrid executable '{}' not found; falling back to serial '{}'",
                plan.executable.display(),
                self.config.serial_exe.display()
            );
            warn!("{}", note);
            plan.notes.push(note);
            plan.mode = ExecMode::Serial;
            plan.executable = self.config.serial_exe.clone();
            plan.rank_count = 0;
            plan.threads_per_rank = plan.total_cores;
            return Ok(());
        }

        Err(QcrunError::ExecutableNotFound {
            serial: self.config.serial_exe.clone(),
            hybrid: self.config.hybrid_exe.clone(),
        })
    }
}

/// Check that a path is an existing file with an executable bit set
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[cfg(unix)]
    fn write_executable(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn config_with_exes(dir: &Path, serial: bool, hybrid: bool) -> RunConfig {
        let serial_exe = if serial {
            write_executable(dir, "qcx")
        } else {
            dir.join("qcx")
        };
        let hybrid_exe = if hybrid {
            write_executable(dir, "qcx-mpi")
        } else {
            dir.join("qcx-mpi")
        };
        RunConfig {
            serial_exe,
            hybrid_exe,
            ..RunConfig::default()
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_serial_plan_uses_all_cores() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_exes(dir.path(), true, true);
        let allocator = ResourceAllocator::new(&config);

        for ranks in [0, 1] {
            let plan = allocator.allocate(16, ranks).unwrap();
            assert_eq!(plan.mode, ExecMode::Serial);
            assert_eq!(plan.rank_count, 0);
            assert_eq!(plan.threads_per_rank, 16);
            assert_eq!(plan.executable, config.serial_exe);
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_hybrid_even_and_floored_split() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_exes(dir.path(), true, true);
        let allocator = ResourceAllocator::new(&config);

        let plan = allocator.allocate(8, 4).unwrap();
        assert_eq!(plan.mode, ExecMode::Hybrid);
        assert_eq!(plan.rank_count, 4);
        assert_eq!(plan.threads_per_rank, 2);

        // Uneven split floors
        let plan = allocator.allocate(8, 3).unwrap();
        assert_eq!(plan.threads_per_rank, 2);
    }

    #[test]
    #[cfg(unix)]
    fn test_oversubscription_floors_to_one_with_note() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_exes(dir.path(), true, true);
        let allocator = ResourceAllocator::new(&config);

        let plan = allocator.allocate(4, 8).unwrap();
        assert_eq!(plan.threads_per_rank, 1);
        assert_eq!(plan.rank_count, 8);
        assert!(plan.has_warnings());
    }

    #[test]
    fn test_negative_ranks_rejected() {
        let config = RunConfig::default();
        let allocator = ResourceAllocator::new(&config);
        let err = allocator.allocate(8, -1).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    #[cfg(unix)]
    fn test_hybrid_falls_back_to_serial() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_exes(dir.path(), true, false);
        let allocator = ResourceAllocator::new(&config);

        let plan = allocator.allocate(8, 4).unwrap();
        assert_eq!(plan.mode, ExecMode::Serial);
        assert_eq!(plan.rank_count, 0);
        assert_eq!(plan.threads_per_rank, 8);
        assert_eq!(plan.executable, config.serial_exe);
        assert!(plan.has_warnings());
    }

    #[test]
    #[cfg(unix)]
    fn test_no_executable_is_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_exes(dir.path(), false, false);
        let allocator = ResourceAllocator::new(&config);

        let err = allocator.allocate(8, 4).unwrap_err();
        assert!(err.is_resource());
    }

    #[test]
    #[cfg(unix)]
    fn test_env_vars_derived_from_plan() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with_exes(dir.path(), true, true);
        let allocator = ResourceAllocator::new(&config);

        let serial = allocator.allocate(16, 0).unwrap();
        let vars = serial.env_vars();
        assert!(vars.contains(&("OMP_NUM_THREADS".to_string(), "16".to_string())));
        assert!(!vars.iter().any(|(k, _)| k == "OMP_PROC_BIND"));

        let hybrid = allocator.allocate(16, 4).unwrap();
        let vars = hybrid.env_vars();
        assert!(vars.contains(&("OMP_NUM_THREADS".to_string(), "4".to_string())));
        assert!(vars.contains(&("OMP_PROC_BIND".to_string(), "close".to_string())));
    }

    #[test]
    #[cfg(unix)]
    fn test_non_executable_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("data.txt");
        fs::write(&plain, "not a binary").unwrap();
        assert!(!is_executable(&plain));
        assert!(!is_executable(&dir.path().join("missing")));
    }
}
