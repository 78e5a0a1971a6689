//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Override worker settings
    if let Some(concurrency) = cli.concurrency {
        config.workers.concurrency = concurrency;
    }
    if let Some(interval) = cli.healthcheck_interval_ms {
        config.workers.healthcheck_interval_ms = interval;
    }
    for (key, value) in &cli.env {
        config.workers.env.insert(key.clone(), value.clone());
    }

    // Override runner settings
    if !cli.command.is_empty() {
        config.runner.command = cli.command.clone();
    }
    if cli.per_file {
        config.runner.strategy = ExecutionStrategy::PerFile;
    }
    if let Some(ref pattern) = cli.pattern {
        config.runner.pattern = pattern.clone();
    }
    if let Some(code) = cli.failure_exit_code {
        config.runner.failure_exit_code = code;
    }

    // Override output settings
    if let Some(ref dir) = cli.capture_dir {
        config.output.capture_dir = dir.clone();
    }
    if let Some(ref path) = cli.json_summary {
        config.output.json_summary = Some(path.clone());
    }

    // Override runtime settings
    if let Some(ref dir) = cli.socket_dir {
        config.runtime.socket_dir = dir.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.runtime.log_level = level.clone();
    }
    if cli.dry_run {
        config.runtime.dry_run = true;
    }

    Ok(config)
}
