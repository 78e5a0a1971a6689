//! Run results collected by the orchestrator

use serde::Serialize;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Outcome of one worker process
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub rank: usize,
    pub pid: u32,
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    pub success: bool,
    pub capture_path: PathBuf,
}

impl WorkerReport {
    pub fn from_status(rank: usize, pid: u32, capture_path: PathBuf, status: ExitStatus) -> Self {
        Self {
            rank,
            pid,
            exit_code: status.code(),
            signal: status.signal(),
            success: status.success(),
            capture_path,
        }
    }

    /// Worker that could not be waited on
    pub fn lost(rank: usize, pid: u32, capture_path: PathBuf) -> Self {
        Self {
            rank,
            pid,
            exit_code: None,
            signal: None,
            success: false,
            capture_path,
        }
    }

    /// Short status text for summaries
    pub fn status_text(&self) -> String {
        match (self.exit_code, self.signal) {
            (Some(0), _) => "passed".to_string(),
            (Some(code), _) => format!("failed (exit {})", code),
            (None, Some(signal)) => format!("killed (signal {})", signal),
            (None, None) => "lost".to_string(),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct PoolReport {
    /// Run start, RFC 3339
    pub started_at: String,
    pub duration: Duration,
    pub total_items: usize,
    pub dispatched: usize,
    /// Workers in spawn order
    pub workers: Vec<WorkerReport>,
    /// Set when the coordinator stopped before dispatching everything
    pub dispatch_error: Option<String>,
}

impl PoolReport {
    /// True when dispatch completed and every worker exited 0
    pub fn success(&self) -> bool {
        self.dispatch_error.is_none() && self.workers.iter().all(|w| w.success)
    }

    pub fn failed_workers(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| !w.success)
    }
}
