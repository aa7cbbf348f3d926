//! Failure diagnosis module
//!
//! Scans a failed run's output log for known failure signatures and
//! turns it into a structured, user-actionable diagnostic.

mod classifier;

pub use classifier::{classify, Diagnostic, FailureCategory, EXCERPT_LINES};
