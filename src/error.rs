//! Error types for qcrun
//!
//! This module defines all error types used throughout the harness,
//! split along two axes: validation errors (bad parameters, rejected
//! before any side effect) and resource errors (missing executables,
//! workspace failures, rejected before process spawn). A non-zero
//! compute exit is NOT an error here — it is a normal terminal state
//! carried inside `ExecutionResult` together with its `Diagnostic`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for qcrun operations
#[derive(Error, Debug)]
pub enum QcrunError {
    /// Malformed input parameters, rejected before any side effect
    #[error("Invalid parameter: {0}")]
    Validation(String),

    /// No usable compute executable was found
    #[error("No compute executable found (looked for '{serial}' and '{hybrid}')")]
    ExecutableNotFound {
        /// Serial variant that was checked
        serial: PathBuf,
        /// Hybrid (MPI) variant that was checked
        hybrid: PathBuf,
    },

    /// Path exists but is not an executable file
    #[error("Not an executable file: {0}")]
    NotExecutable(PathBuf),

    /// Multi-process launcher (e.g. mpirun) missing for hybrid mode
    #[error("Hybrid launcher '{0}' not found on PATH")]
    LauncherNotFound(String),

    /// Workspace directory could not be created
    #[error("Failed to create workspace at '{path}': {source}")]
    WorkspaceCreate {
        /// Workspace root that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A required input file is missing
    #[error("Required input file not found: {0}")]
    RequiredInputMissing(PathBuf),

    /// I/O error during staging or retrieval
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Path the operation touched
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The compute process could not be spawned
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        /// Command line that failed to launch
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QcrunError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error is a validation error (bad caller input)
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error is a resource error (missing executable,
    /// workspace or staging failure)
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound { .. }
                | Self::NotExecutable(_)
                | Self::LauncherNotFound(_)
                | Self::WorkspaceCreate { .. }
                | Self::RequiredInputMissing(_)
                | Self::Io { .. }
                | Self::Spawn { .. }
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::NotExecutable(path)
            | Self::RequiredInputMissing(path)
            | Self::WorkspaceCreate { path, .. }
            | Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for qcrun operations
pub type Result<T> = std::result::Result<T, QcrunError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| QcrunError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = QcrunError::io("/scratch/job_1/INPUT", io_err);
        assert!(err.is_resource());
        assert_eq!(err.path().unwrap(), &PathBuf::from("/scratch/job_1/INPUT"));
    }

    #[test]
    fn test_taxonomy_split() {
        let validation = QcrunError::validation("ranks must be non-negative");
        assert!(validation.is_validation());
        assert!(!validation.is_resource());

        let resource = QcrunError::RequiredInputMissing(PathBuf::from("water.inp"));
        assert!(resource.is_resource());
        assert!(!resource.is_validation());
    }

    #[test]
    fn test_with_path_ext() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_path("/scratch").unwrap_err();
        assert!(matches!(err, QcrunError::Io { .. }));
    }
}
