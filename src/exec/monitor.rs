//! Concurrent liveness monitoring
//!
//! A cooperating task that polls the spawned compute process every
//! ~100 ms while the executor blocks on `wait()`. Each sample feeds
//! the progress reporter with elapsed time and resident memory, so a
//! caller (e.g. a UI layer) sees the job is alive without the
//! execution path ever blocking on rendering. Completion is signalled
//! over a oneshot channel and the task is joined before `run` returns.

use crate::progress::ProgressReporter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::oneshot;
use tracing::trace;

/// Poll interval for liveness sampling
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll the process with `pid` until it exits or `done` fires
pub(crate) async fn monitor_process(
    pid: u32,
    job_name: String,
    progress: Arc<ProgressReporter>,
    mut done: oneshot::Receiver<()>,
) {
    let mut sys = System::new();
    let sys_pid = Pid::from_u32(pid);
    let start = Instant::now();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut done => break,
            _ = ticker.tick() => {
                sys.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]));
                match sys.process(sys_pid) {
                    Some(process) => {
                        let rss = process.memory();
                        trace!(pid, rss, "liveness sample");
                        progress.liveness(&job_name, start.elapsed(), Some(rss));
                    }
                    // Process gone; the executor's wait() will pick up
                    // the exit status momentarily.
                    None => break,
                }
            }
        }
    }
}
