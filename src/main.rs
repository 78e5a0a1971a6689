//! specpool CLI entry point

use anyhow::Result;
use specpool::config::cli::{Cli, ExecutionMode};
use specpool::config::{files, Config};
use specpool::output::{json, text};
use specpool::pool::Pool;
use specpool::util::logger::{init_logger, LogLevel};
use specpool::worker::{export_worker_env, run_worker_main, WorkerIdentity};
use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();
    cli.validate()?;

    // Workers re-derive the same configuration from the forwarded arguments
    let config = Config::from_cli(&cli)?;
    let level = LogLevel::from_str(&config.runtime.log_level).unwrap_or(LogLevel::Info);
    let mode = cli.mode();
    // Worker stderr is a capture file
    let ansi = matches!(mode, ExecutionMode::Run) && std::io::stderr().is_terminal();
    init_logger(level, ansi);

    match mode {
        ExecutionMode::Run => run_pool(&cli, &config),
        ExecutionMode::Worker { rank, socket } => run_worker(&config, rank, &socket),
    }
}

/// Run as the orchestrator
fn run_pool(cli: &Cli, config: &Config) -> Result<()> {
    let paths = if cli.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths.clone()
    };

    let items = files::discover(&paths, &config.runner.pattern)?;

    if config.runtime.dry_run {
        for item in &items {
            println!("{}", item);
        }
        eprintln!("{} test file(s) would run on {} worker(s)", items.len(), config.workers.concurrency);
        return Ok(());
    }

    if items.is_empty() {
        warn!("No test files matching '{}' found", config.runner.pattern);
    }

    let forwarded: Vec<OsString> = std::env::args_os().skip(1).collect();
    let pool = Pool::new(config, forwarded)?;
    let report = pool.run(items)?;

    text::print_summary(&report);

    if let Some(path) = &config.output.json_summary {
        let summary = json::build_run_summary(&report, config);
        json::write_json_summary(path, &summary, true)?;
        info!("JSON summary written to {}", path.display());
    }

    if !report.success() {
        std::process::exit(1);
    }

    Ok(())
}

/// Run as a worker process. Never returns.
fn run_worker(config: &Config, rank: usize, socket: &Path) -> Result<()> {
    let hook = |identity: &WorkerIdentity| export_worker_env(identity, &config.workers.env);

    let code = match run_worker_main(config, rank, socket, hook) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            config.runner.failure_exit_code
        }
    };

    // No destructors run past this point
    std::process::exit(code)
}
