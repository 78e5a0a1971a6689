//! Worker process entry point
//!
//! Everything a re-executed worker does before and around [`Worker::run`]:
//! capture its output, run the after-spawn hook, build a fresh engine and
//! report a process exit code.

use super::{capture, Worker, WorkerOptions};
use crate::config::Config;
use crate::distributed::SocketBuilder;
use crate::engine::command::CommandEngine;
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Environment variable carrying the worker rank
pub const RANK_ENV_VAR: &str = "SPECPOOL_WORKER_RANK";

/// Placeholder expanded to the rank in configured environment values
pub const RANK_PLACEHOLDER: &str = "{rank}";

/// A worker as seen from inside its own process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub rank: usize,
    pub pid: u32,
}

impl WorkerIdentity {
    /// Identity of the calling process
    pub fn current(rank: usize) -> Self {
        Self {
            rank,
            pid: std::process::id(),
        }
    }
}

/// Built-in after-spawn hook: export the rank and the configured variables.
pub fn export_worker_env(identity: &WorkerIdentity, env: &BTreeMap<String, String>) {
    let rank = identity.rank.to_string();
    std::env::set_var(RANK_ENV_VAR, &rank);

    for (key, value) in env {
        std::env::set_var(key, value.replace(RANK_PLACEHOLDER, &rank));
    }
}

/// Run a worker process to completion and return its exit code.
///
/// Output is redirected to the capture file before `after_spawn` runs, so
/// anything the hook prints is captured too.
pub fn run_worker_main<H>(config: &Config, rank: usize, socket: &Path, after_spawn: H) -> Result<i32>
where
    H: Fn(&WorkerIdentity),
{
    let identity = WorkerIdentity::current(rank);
    let capture_file = capture::capture_path(&config.output.capture_dir, identity.pid);
    capture::redirect_stdio(&capture_file)?;

    after_spawn(&identity);

    info!("worker[{}] started (pid {})", identity.rank, identity.pid);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let engine = CommandEngine::new(config.runner.command.clone(), config.runner.strategy);
    let options = WorkerOptions {
        healthcheck_interval: config.workers.healthcheck_interval(),
        max_healthcheck_attempts: config.workers.max_healthcheck_attempts,
        // The orchestrator binds before spawning anyone
        retry_until_bound: false,
    };

    let mut worker = Worker::new(rank, SocketBuilder::new(socket), engine, options);
    let passed = worker.run(&runtime)?;

    info!(
        "worker[{}] finished: {} item(s), {}",
        rank,
        worker.received(),
        if passed { "passed" } else { "failed" }
    );

    Ok(if passed { 0 } else { config.runner.failure_exit_code })
}
