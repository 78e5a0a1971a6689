//! Configuration validation

use super::*;
use crate::util::logger::LogLevel;
use std::path::Path;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workers(&config.workers)?;
    validate_runner(&config.runner)?;
    validate_output(&config.output)?;
    validate_runtime(&config.runtime)?;

    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.concurrency == 0 {
        anyhow::bail!("workers.concurrency must be at least 1");
    }

    if workers.healthcheck_interval_ms == 0 {
        anyhow::bail!("workers.healthcheck_interval_ms must be greater than 0");
    }

    if workers.max_healthcheck_attempts == Some(0) {
        anyhow::bail!("workers.max_healthcheck_attempts must be greater than 0 if specified");
    }

    for key in workers.env.keys() {
        validate_env_key(key)?;
    }

    // Warn if process count is very high
    if workers.concurrency > 256 {
        eprintln!(
            "Warning: Very high worker count ({}), each worker is a separate process",
            workers.concurrency
        );
    }

    Ok(())
}

fn validate_env_key(key: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("environment variable name must not be empty");
    }
    if key.contains('=') || key.contains('\0') {
        anyhow::bail!("invalid environment variable name: {:?}", key);
    }
    Ok(())
}

/// Validate runner configuration
pub fn validate_runner(runner: &RunnerConfig) -> Result<()> {
    match runner.command.first() {
        None => anyhow::bail!("no test command given (pass it after `--` or set runner.command)"),
        Some(program) if program.is_empty() => anyhow::bail!("test command program is empty"),
        Some(_) => {}
    }

    if runner.pattern.is_empty() {
        anyhow::bail!("runner.pattern must not be empty");
    }

    if runner.failure_exit_code == 0 {
        anyhow::bail!("runner.failure_exit_code must not be 0");
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    validate_directory("capture_dir", &output.capture_dir)?;

    if let Some(path) = &output.json_summary {
        if path.is_dir() {
            anyhow::bail!("json_summary must be a file path, got directory {}", path.display());
        }
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if LogLevel::from_str(&runtime.log_level).is_none() {
        anyhow::bail!(
            "unknown log level '{}' (expected trace, debug, info, warn or error)",
            runtime.log_level
        );
    }

    validate_directory("socket_dir", &runtime.socket_dir)
}

fn validate_directory(name: &str, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not an existing directory: {}", name, dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.runner.command = vec!["sh".to_string()];
        config.output.capture_dir = dir.path().to_path_buf();
        config.runtime.socket_dir = dir.path().to_path_buf();
        config
    }

    #[test]
    fn test_valid_config() {
        let dir = TempDir::new().unwrap();
        assert!(validate_config(&valid_config(&dir)).is_ok());
    }

    #[test]
    fn test_validate_workers() {
        let mut workers = WorkerConfig::default();
        assert!(validate_workers(&workers).is_ok());

        workers.concurrency = 0;
        assert!(validate_workers(&workers).is_err());

        workers.concurrency = 2;
        workers.max_healthcheck_attempts = Some(0);
        assert!(validate_workers(&workers).is_err());

        workers.max_healthcheck_attempts = None;
        workers.env.insert("BAD=KEY".to_string(), "x".to_string());
        assert!(validate_workers(&workers).is_err());
    }

    #[test]
    fn test_validate_runner() {
        let mut runner = RunnerConfig::default();
        assert!(validate_runner(&runner).is_err());

        runner.command = vec!["rspec".to_string()];
        assert!(validate_runner(&runner).is_ok());

        runner.failure_exit_code = 0;
        assert!(validate_runner(&runner).is_err());

        runner.failure_exit_code = 1;
        runner.command = vec![String::new()];
        assert!(validate_runner(&runner).is_err());
    }

    #[test]
    fn test_validate_directories() {
        let dir = TempDir::new().unwrap();

        let mut config = valid_config(&dir);
        config.output.capture_dir = dir.path().join("missing");
        assert!(validate_config(&config).is_err());

        let mut config = valid_config(&dir);
        config.runtime.socket_dir = dir.path().join("missing");
        assert!(validate_config(&config).is_err());

        let mut config = valid_config(&dir);
        config.output.json_summary = Some(dir.path().to_path_buf());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let dir = TempDir::new().unwrap();
        let mut config = valid_config(&dir);

        config.runtime.log_level = "WARN".to_string();
        assert!(validate_config(&config).is_ok());

        config.runtime.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }
}
