//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, test file discovery
//! and validation.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! command-line flags. Worker processes re-run the same layering from the
//! forwarded arguments, so the orchestrator never ships configuration to them.

pub mod cli;
pub mod files;
pub mod toml;
pub mod validator;

use crate::engine::command::ExecutionStrategy;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Build the effective configuration for `cli`: file, then flags, then validation.
    pub fn from_cli(cli: &cli::Cli) -> Result<Self> {
        let base = match &cli.config {
            Some(path) => toml::parse_toml_file(path)?,
            None => Config::default(),
        };

        let config = toml::merge_cli_with_config(cli, base)?;
        validator::validate_config(&config)?;
        Ok(config)
    }
}

/// Worker process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker processes
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Pause between health checks (milliseconds)
    #[serde(default = "default_healthcheck_interval_ms")]
    pub healthcheck_interval_ms: u64,
    /// Give up health-checking after this many attempts
    pub max_healthcheck_attempts: Option<u32>,
    /// Extra environment for every worker; `{rank}` is replaced by the worker rank
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_healthcheck_interval_ms() -> u64 {
    500
}

impl WorkerConfig {
    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_millis(self.healthcheck_interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            healthcheck_interval_ms: default_healthcheck_interval_ms(),
            max_healthcheck_attempts: None,
            env: BTreeMap::new(),
        }
    }
}

/// Test command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Command line used to run test files
    #[serde(default)]
    pub command: Vec<String>,
    /// Batch or per-file invocation
    #[serde(default)]
    pub strategy: ExecutionStrategy,
    /// File name suffix that marks a test file inside directories
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Worker exit code when tests fail
    #[serde(default = "default_failure_exit_code")]
    pub failure_exit_code: i32,
}

fn default_pattern() -> String {
    "_test".to_string()
}

fn default_failure_exit_code() -> i32 {
    1
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            strategy: ExecutionStrategy::default(),
            pattern: default_pattern(),
            failure_exit_code: default_failure_exit_code(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one capture file per worker
    #[serde(default = "default_tmp_dir")]
    pub capture_dir: PathBuf,
    /// JSON run summary path
    pub json_summary: Option<PathBuf>,
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            capture_dir: default_tmp_dir(),
            json_summary: None,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Directory for the coordinator socket
    #[serde(default = "default_tmp_dir")]
    pub socket_dir: PathBuf,
    /// Log level name
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// List files instead of running them
    #[serde(default)]
    pub dry_run: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_tmp_dir(),
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workers:      {}", self.workers.concurrency)?;
        writeln!(f, "Command:      {}", self.runner.command.join(" "))?;
        writeln!(f, "Strategy:     {:?}", self.runner.strategy)?;
        writeln!(f, "Pattern:      {}", self.runner.pattern)?;
        writeln!(f, "Capture dir:  {}", self.output.capture_dir.display())?;
        write!(f, "Socket dir:   {}", self.runtime.socket_dir.display())
    }
}
