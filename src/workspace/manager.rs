//! Workspace creation, staging, retrieval and cleanup
//!
//! The compute binary speaks a fixed filename protocol: it reads
//! `INPUT`, writes `OUTPUT`, and optionally reads/writes `RESTART`
//! and `OPT` state. Staging maps caller files onto those names by
//! suffix; retrieval maps them back to caller-facing artifact names.
//!
//! Cleanup is idempotent and guarded: a workspace root that is not
//! strictly under the configured scratch base is never deleted, only
//! warned about, so a misconfigured base cannot wipe foreign data.

use crate::config::RunConfig;
use crate::error::{IoResultExt, QcrunError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed input filename the compute binary reads from
pub const INPUT_FILE: &str = "INPUT";
/// Fixed output filename the compute binary writes to
pub const OUTPUT_FILE: &str = "OUTPUT";
/// Fixed restart-state filename (density matrix from a previous run)
pub const RESTART_FILE: &str = "RESTART";
/// Fixed geometry-optimization state filename
pub const OPT_FILE: &str = "OPT";

/// An ephemeral, job-unique scratch directory
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Workspace root directory
    pub root: PathBuf,
    /// Protocol names of the files actually staged
    pub manifest: Vec<String>,
}

impl Workspace {
    /// Absolute path of a workspace-relative protocol file
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Creates, stages, retrieves and destroys per-job workspaces
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    scratch_base: PathBuf,
    prefix: String,
}

impl WorkspaceManager {
    /// Create a manager rooted at the configured scratch base
    pub fn new(config: &RunConfig) -> Self {
        Self {
            scratch_base: config.scratch_base.clone(),
            prefix: config.workspace_prefix.clone(),
        }
    }

    /// Scratch base all workspaces live under
    pub fn scratch_base(&self) -> &Path {
        &self.scratch_base
    }

    /// Create a fresh workspace directory for `job_id`
    ///
    /// The path is `<scratch_base>/<prefix>_<job_id>`; the job id is
    /// expected to disambiguate concurrent invocations (the runner
    /// embeds the process id). A job id carrying path separators would
    /// let the root escape the scratch base, so it is rejected here.
    pub fn create(&self, job_id: &str) -> Result<Workspace> {
        if job_id.contains(['/', '\\']) {
            return Err(QcrunError::validation(format!(
                "job id '{}' must not contain path separators",
                job_id
            )));
        }
        let root = self.scratch_base.join(format!("{}_{}", self.prefix, job_id));
        fs::create_dir_all(&root).map_err(|source| QcrunError::WorkspaceCreate {
            path: root.clone(),
            source,
        })?;
        info!(root = %root.display(), "workspace created");
        Ok(Workspace {
            root,
            manifest: Vec::new(),
        })
    }

    /// Stage input files into the workspace under protocol names
    ///
    /// A missing required file is a hard error; missing optional files
    /// are skipped. Returns the manifest of protocol names actually
    /// staged (also recorded on the workspace).
    pub fn stage(
        &self,
        workspace: &mut Workspace,
        required: &[PathBuf],
        optional: &[PathBuf],
    ) -> Result<Vec<String>> {
        for source in required {
            if !source.is_file() {
                return Err(QcrunError::RequiredInputMissing(source.clone()));
            }
            let name = protocol_name(source);
            fs::copy(source, workspace.file(name)).with_path(source)?;
            debug!(source = %source.display(), staged_as = name, "staged required file");
            workspace.manifest.push(name.to_string());
        }

        for source in optional {
            if !source.is_file() {
                debug!(source = %source.display(), "optional file not present, skipping");
                continue;
            }
            let name = protocol_name(source);
            fs::copy(source, workspace.file(name)).with_path(source)?;
            debug!(source = %source.display(), staged_as = name, "staged optional file");
            workspace.manifest.push(name.to_string());
        }

        Ok(workspace.manifest.clone())
    }

    /// Retrieve produced artifacts out of the workspace
    ///
    /// `result_map` maps protocol names to caller-facing destinations.
    /// Artifacts the job did not produce are skipped silently; copy
    /// failures are logged but never fatal (the run itself already
    /// finished). Returns the destinations actually written.
    pub fn retrieve(&self, workspace: &Workspace, result_map: &[(String, PathBuf)]) -> Vec<PathBuf> {
        let mut retrieved = Vec::new();
        for (internal, destination) in result_map {
            let source = workspace.file(internal);
            if !source.is_file() {
                continue;
            }
            match fs::copy(&source, destination) {
                Ok(_) => {
                    debug!(artifact = internal.as_str(), to = %destination.display(), "retrieved artifact");
                    retrieved.push(destination.clone());
                }
                Err(e) => {
                    warn!(artifact = internal.as_str(), to = %destination.display(), error = %e,
                          "failed to retrieve artifact");
                }
            }
        }
        retrieved
    }

    /// Remove the workspace directory
    ///
    /// Idempotent: an already-removed (or never-created) workspace is a
    /// no-op. Refuses to delete a root that does not resolve to a
    /// strict sub-path of the scratch base. The containment check runs
    /// on canonicalized paths so `..` components and symlinks in a
    /// corrupted root cannot smuggle the deletion outside the base.
    pub fn cleanup(&self, workspace: &Workspace) {
        if !workspace.root.exists() {
            return;
        }
        let (root, base) = match (
            workspace.root.canonicalize(),
            self.scratch_base.canonicalize(),
        ) {
            (Ok(root), Ok(base)) => (root, base),
            _ => {
                warn!(
                    root = %workspace.root.display(),
                    base = %self.scratch_base.display(),
                    "refusing to delete workspace with unresolvable paths"
                );
                return;
            }
        };
        if !root.starts_with(&base) || root == base {
            warn!(
                root = %workspace.root.display(),
                base = %self.scratch_base.display(),
                "refusing to delete workspace outside the scratch base"
            );
            return;
        }
        match fs::remove_dir_all(&root) {
            Ok(()) => debug!(root = %root.display(), "workspace removed"),
            Err(e) => warn!(root = %root.display(), error = %e, "workspace cleanup failed"),
        }
    }
}

/// Map a source file suffix onto its workspace protocol name
///
/// Restart data and optimization state have dedicated slots; anything
/// else is treated as the main input deck.
fn protocol_name(source: &Path) -> &'static str {
    match source.extension().and_then(|e| e.to_str()) {
        Some("restart") => RESTART_FILE,
        Some("opt") => OPT_FILE,
        _ => INPUT_FILE,
    }
}

/// Scope guard that removes the workspace when dropped
///
/// Established immediately after workspace creation so that every
/// subsequent exit path — success, execution failure, early resource
/// error, panic or interrupt — runs cleanup exactly once.
pub struct WorkspaceGuard<'a> {
    manager: &'a WorkspaceManager,
    workspace: Workspace,
}

impl<'a> WorkspaceGuard<'a> {
    /// Arm a guard for `workspace`
    pub fn new(manager: &'a WorkspaceManager, workspace: Workspace) -> Self {
        Self { manager, workspace }
    }

    /// The guarded workspace
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Mutable access for staging
    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }
}

impl Drop for WorkspaceGuard<'_> {
    fn drop(&mut self) {
        self.manager.cleanup(&self.workspace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager(base: &Path) -> WorkspaceManager {
        let config = RunConfig {
            scratch_base: base.to_path_buf(),
            ..RunConfig::default()
        };
        WorkspaceManager::new(&config)
    }

    #[test]
    fn test_create_under_scratch_base() {
        let base = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());
        let ws = manager.create("water_42").unwrap();
        assert!(ws.root.starts_with(base.path()));
        assert!(ws.root.is_dir());
    }

    #[test]
    fn test_stage_required_missing_is_error() {
        let base = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());
        let mut ws = manager.create("job_1").unwrap();

        let err = manager
            .stage(&mut ws, &[base.path().join("absent.inp")], &[])
            .unwrap_err();
        assert!(matches!(err, QcrunError::RequiredInputMissing(_)));
    }

    #[test]
    fn test_stage_maps_suffixes_and_skips_missing_optional() {
        let base = tempfile::tempdir().unwrap();
        let inputs = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());
        let mut ws = manager.create("job_2").unwrap();

        let inp = inputs.path().join("water.inp");
        let restart = inputs.path().join("water.restart");
        fs::write(&inp, "geometry water").unwrap();
        fs::write(&restart, "density matrix").unwrap();

        let manifest = manager
            .stage(
                &mut ws,
                &[inp],
                &[restart, inputs.path().join("water.opt")],
            )
            .unwrap();

        assert_eq!(manifest, vec![INPUT_FILE.to_string(), RESTART_FILE.to_string()]);
        assert!(ws.file(INPUT_FILE).is_file());
        assert!(ws.file(RESTART_FILE).is_file());
        assert!(!ws.file(OPT_FILE).exists());
    }

    #[test]
    fn test_retrieve_skips_missing_artifacts() {
        let base = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());
        let ws = manager.create("job_3").unwrap();

        fs::write(ws.file(OUTPUT_FILE), "SCF converged").unwrap();

        let map = vec![
            (OUTPUT_FILE.to_string(), out.path().join("water.out")),
            (RESTART_FILE.to_string(), out.path().join("water.restart")),
        ];
        let retrieved = manager.retrieve(&ws, &map);
        assert_eq!(retrieved, vec![out.path().join("water.out")]);
        assert!(out.path().join("water.out").is_file());
        assert!(!out.path().join("water.restart").exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());
        let ws = manager.create("job_4").unwrap();

        manager.cleanup(&ws);
        assert!(!ws.root.exists());
        // Second call is a no-op, not an error
        manager.cleanup(&ws);

        // Never-created workspace is also a no-op
        let phantom = Workspace {
            root: base.path().join("qcrun_never_made"),
            manifest: Vec::new(),
        };
        manager.cleanup(&phantom);
    }

    #[test]
    fn test_cleanup_refuses_outside_scratch_base() {
        let base = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());

        let corrupted = Workspace {
            root: elsewhere.path().to_path_buf(),
            manifest: Vec::new(),
        };
        manager.cleanup(&corrupted);
        assert!(elsewhere.path().exists());

        // The base itself is likewise off limits
        let self_pointing = Workspace {
            root: base.path().to_path_buf(),
            manifest: Vec::new(),
        };
        manager.cleanup(&self_pointing);
        assert!(base.path().exists());
    }

    #[test]
    fn test_cleanup_refuses_dotdot_traversal_root() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("inner");
        fs::create_dir_all(&base).unwrap();
        let manager = test_manager(&base);

        let victim = tmp.path().join("victim");
        fs::create_dir_all(&victim).unwrap();
        fs::write(victim.join("data.txt"), "precious").unwrap();

        // A corrupted root that is lexically under the base but walks
        // back out through literal `..` components
        fs::create_dir_all(base.join("qcrun_..")).unwrap();
        let corrupted = Workspace {
            root: base.join("qcrun_../../../victim"),
            manifest: Vec::new(),
        };
        manager.cleanup(&corrupted);
        assert!(victim.exists());
        assert!(victim.join("data.txt").is_file());
    }

    #[test]
    fn test_create_rejects_job_id_with_separators() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("inner");
        fs::create_dir_all(&base).unwrap();
        let manager = test_manager(&base);

        let err = manager.create("../../victim").unwrap_err();
        assert!(err.is_validation());
        assert!(!tmp.path().join("victim").exists());
    }

    #[test]
    fn test_guard_cleans_up_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let manager = test_manager(base.path());
        let ws = manager.create("job_5").unwrap();
        let root = ws.root.clone();

        {
            let _guard = WorkspaceGuard::new(&manager, ws);
            assert!(root.is_dir());
        }
        assert!(!root.exists());
    }
}
