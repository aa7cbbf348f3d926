//! Resource allocation module
//!
//! Computes the execution plan (serial vs. hybrid) for one compute job
//! from the available cores and the requested rank count, and resolves
//! which executable variant will be launched.

mod allocator;

pub use allocator::{is_executable, ExecMode, ResourceAllocator, ResourcePlan};
