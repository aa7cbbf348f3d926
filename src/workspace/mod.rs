//! Ephemeral workspace module
//!
//! Every job runs inside its own scratch directory: inputs are staged
//! in under fixed protocol names, the compute binary reads and writes
//! only inside the workspace, results are retrieved out afterwards,
//! and the directory is removed on every exit path.

mod manager;

pub use manager::{
    Workspace, WorkspaceGuard, WorkspaceManager, INPUT_FILE, OPT_FILE, OUTPUT_FILE, RESTART_FILE,
};
