//! CLI argument parsing using clap

use clap::Parser;
use std::path::PathBuf;

/// Flag that switches a re-executed process into worker mode
pub const INTERNAL_WORKER_FLAG: &str = "--internal-worker";

/// Flag carrying the coordinator socket path to a worker
pub const COORDINATOR_SOCKET_FLAG: &str = "--coordinator-socket";

/// Execution mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Orchestrator (default) - discover files, run coordinator, spawn workers
    Run,
    /// Worker - pull files from the coordinator at `socket` and run them
    Worker { rank: usize, socket: PathBuf },
}

/// specpool - run test files in parallel worker processes
#[derive(Parser, Debug)]
#[command(name = "specpool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Test files or directories to search for test files
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Test command; `{}` is replaced by the test files, otherwise they are appended
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    /// Number of worker processes (default: number of CPUs)
    #[arg(short = 'j', long, env = "SPECPOOL_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File name suffix that marks a test file when searching directories,
    /// matched with or without the extension
    #[arg(long)]
    pub pattern: Option<String>,

    /// Invoke the test command once per file instead of once per worker
    #[arg(long)]
    pub per_file: bool,

    /// Directory for worker capture files
    #[arg(long, value_name = "DIR")]
    pub capture_dir: Option<PathBuf>,

    /// Directory for the coordinator socket
    #[arg(long, value_name = "DIR")]
    pub socket_dir: Option<PathBuf>,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    pub json_summary: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Exit code a worker uses when its tests fail
    #[arg(long)]
    pub failure_exit_code: Option<i32>,

    /// Pause between worker health checks in milliseconds
    #[arg(long, value_name = "MS")]
    pub healthcheck_interval_ms: Option<u64>,

    /// Extra environment variable for every worker (`{rank}` is expanded)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// List the test files that would run and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Worker rank (set by the orchestrator)
    #[arg(long, hide = true, value_name = "RANK", requires = "coordinator_socket")]
    pub internal_worker: Option<usize>,

    /// Coordinator socket path (set by the orchestrator)
    #[arg(long, hide = true, value_name = "PATH", requires = "internal_worker")]
    pub coordinator_socket: Option<PathBuf>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn mode(&self) -> ExecutionMode {
        match (self.internal_worker, &self.coordinator_socket) {
            (Some(rank), Some(socket)) => ExecutionMode::Worker {
                rank,
                socket: socket.clone(),
            },
            _ => ExecutionMode::Run,
        }
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        // Workers only need the command, which the orchestrator already checked
        if matches!(self.mode(), ExecutionMode::Worker { .. }) {
            return Ok(());
        }

        if self.concurrency == Some(0) {
            anyhow::bail!("concurrency must be at least 1");
        }

        if self.healthcheck_interval_ms == Some(0) {
            anyhow::bail!("healthcheck interval must be at least 1 ms");
        }

        if let Some(pattern) = &self.pattern {
            if pattern.is_empty() {
                anyhow::bail!("pattern must not be empty");
            }
        }

        Ok(())
    }
}
