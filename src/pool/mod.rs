//! Pool orchestrator
//!
//! Runs one coordinator in this process and N worker processes beside it.
//!
//! # Flow
//!
//! 1. Bind the coordinator socket (`<socket_dir>/specpool-<pid>.sock`) with
//!    the full work list, before any worker exists
//! 2. Spawn workers `0..N` by re-executing the current binary with
//!    `--internal-worker <rank> --coordinator-socket <path>` in front of the
//!    original arguments
//! 3. Serve the coordinator until every item is dispatched
//! 4. Wait for every worker, whatever happened in step 3
//! 5. Print each worker's capture file in spawn order
//!
//! Capture files are left in place after the run.

pub mod report;

use crate::config::cli::{COORDINATOR_SOCKET_FLAG, INTERNAL_WORKER_FLAG};
use crate::config::Config;
use crate::distributed::Coordinator;
use crate::output::text;
use crate::worker::capture;
use crate::Result;
use anyhow::Context;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub use report::{PoolReport, WorkerReport};

/// Coordinator socket path for the orchestrator with process id `pid`
pub fn socket_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("specpool-{}.sock", pid))
}

/// A spawned worker process
#[derive(Debug)]
pub struct WorkerHandle {
    pub rank: usize,
    pub pid: u32,
    pub capture_path: PathBuf,
    child: Child,
}

impl WorkerHandle {
    /// Block until the worker exits.
    fn wait(mut self) -> WorkerReport {
        match self.child.wait() {
            Ok(status) => {
                debug!("worker[{}] (pid {}) exited with {}", self.rank, self.pid, status);
                WorkerReport::from_status(self.rank, self.pid, self.capture_path, status)
            }
            Err(e) => {
                error!("Failed to wait for worker[{}] (pid {}): {}", self.rank, self.pid, e);
                WorkerReport::lost(self.rank, self.pid, self.capture_path)
            }
        }
    }

    /// Kill and reap the worker.
    fn abort(mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Failed to kill worker[{}]: {}", self.rank, e);
        }
        let _ = self.child.wait();
    }
}

/// Orchestrator for one run
pub struct Pool {
    concurrency: usize,
    capture_dir: PathBuf,
    socket_path: PathBuf,
    program: PathBuf,
    forwarded_args: Vec<OsString>,
}

impl Pool {
    /// Create a pool that re-executes the current binary with `forwarded_args`.
    pub fn new(config: &Config, forwarded_args: Vec<OsString>) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to get current executable path")?;

        Ok(Self {
            concurrency: config.workers.concurrency,
            capture_dir: config.output.capture_dir.clone(),
            socket_path: socket_path(&config.runtime.socket_dir, std::process::id()),
            program,
            forwarded_args,
        })
    }

    /// Use `program` instead of the current executable for workers.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Arguments for worker `rank`: hidden worker flags, then the original arguments.
    pub fn worker_args(&self, rank: usize) -> Vec<OsString> {
        let mut args = Vec::with_capacity(self.forwarded_args.len() + 4);
        args.push(INTERNAL_WORKER_FLAG.into());
        args.push(rank.to_string().into());
        args.push(COORDINATOR_SOCKET_FLAG.into());
        args.push(self.socket_path.clone().into_os_string());
        args.extend(self.forwarded_args.iter().cloned());
        args
    }

    /// Dispatch `items` across the workers and collect their results.
    ///
    /// Fails only when the run cannot start: the socket cannot be bound, the
    /// runtime cannot be built, or a worker cannot be spawned. In the last
    /// case workers already spawned are killed and reaped first.
    pub fn run(&self, items: Vec<String>) -> Result<PoolReport> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();
        let total_items = items.len();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;

        let mut coordinator = Coordinator::bind(&self.socket_path, items)?;
        info!(
            "Dispatching {} test file(s) to {} worker(s)",
            total_items, self.concurrency
        );

        let mut handles = Vec::with_capacity(self.concurrency);
        for rank in 0..self.concurrency {
            match self.spawn_worker(rank) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!("Failed to spawn worker[{}], aborting run", rank);
                    for handle in handles {
                        handle.abort();
                    }
                    drop(coordinator);
                    return Err(e);
                }
            }
        }

        let dispatch_error = match runtime.block_on(coordinator.serve()) {
            Ok(_) => None,
            Err(e) => {
                error!("Coordinator stopped early: {:#}", e);
                Some(format!("{:#}", e))
            }
        };
        // Items handed out before a failure still count
        let dispatched = coordinator.counter().dispatched();
        drop(coordinator);

        let workers: Vec<WorkerReport> = handles.into_iter().map(WorkerHandle::wait).collect();

        for worker in &workers {
            match capture::read_capture(&worker.capture_path) {
                Ok(output) => text::print_worker_output(worker.rank, &output),
                Err(e) => warn!("No output from worker[{}]: {:#}", worker.rank, e),
            }
        }

        Ok(PoolReport {
            started_at,
            duration: start.elapsed(),
            total_items,
            dispatched,
            workers,
            dispatch_error,
        })
    }

    fn spawn_worker(&self, rank: usize) -> Result<WorkerHandle> {
        let child = Command::new(&self.program)
            .args(self.worker_args(rank))
            .spawn()
            .with_context(|| format!("Failed to spawn worker process: {}", self.program.display()))?;

        let pid = child.id();
        debug!("Spawned worker[{}] (pid {})", rank, pid);

        Ok(WorkerHandle {
            rank,
            pid,
            capture_path: capture::capture_path(&self.capture_dir, pid),
            child,
        })
    }
}
