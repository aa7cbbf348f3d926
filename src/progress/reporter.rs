//! Progress reporter implementation
//!
//! Uses indicatif for a live spinner showing job name, elapsed wall
//! time and the compute process's resident memory. The executor's
//! monitor task drives updates; rendering never blocks execution.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Progress reporter for a running compute job
pub struct ProgressReporter {
    spinner: ProgressBar,
    enabled: AtomicBool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} [{elapsed_precise}]")
                .expect("Invalid template"),
        );
        Self {
            spinner,
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode and --explain)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.spinner.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Whether this reporter renders anything
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Announce the job that just started
    pub fn job_started(&self, name: &str, mode: &str) {
        self.spinner
            .set_message(format!("{} ({}) running", name, mode));
        self.spinner.tick();
    }

    /// Report a liveness sample from the monitor
    pub fn liveness(&self, name: &str, elapsed: Duration, rss_bytes: Option<u64>) {
        let memory = match rss_bytes {
            Some(bytes) => format!(", {}", humansize::format_size(bytes, humansize::BINARY)),
            None => String::new(),
        };
        self.spinner.set_message(format!(
            "{} running for {}{}",
            name,
            humantime::format_duration(Duration::from_secs(elapsed.as_secs())),
            memory
        ));
        self.spinner.tick();
    }

    /// Finish the spinner with a final message
    pub fn finish(&self, message: &str) {
        if self.is_enabled() {
            self.spinner.finish_with_message(message.to_string());
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
