//! JSON output formatting
//!
//! Writes a run summary with:
//! - Run configuration (workers, command, strategy)
//! - Start/end timestamps and duration
//! - Dispatch totals
//! - Per-worker exit status and capture file

use crate::config::Config;
use crate::pool::PoolReport;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = format_duration_human(d);
        Self { micros, human }
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunConfig {
    pub workers: usize,
    pub command: Vec<String>,
    pub strategy: String,
    pub pattern: String,
}

/// Run information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    pub start_time: String,
    pub end_time: String,
    pub duration: JsonDuration,
    pub config: JsonRunConfig,
}

/// Per-worker result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWorkerResult {
    pub rank: usize,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub success: bool,
    pub capture_path: String,
}

/// Complete JSON summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunSummary {
    pub run_info: JsonRunInfo,
    pub total_items: usize,
    pub dispatched: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_error: Option<String>,
    pub workers: Vec<JsonWorkerResult>,
}

/// Format duration in human-readable format
fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}

/// Build JsonRunConfig from Config
pub fn build_run_config(config: &Config) -> JsonRunConfig {
    JsonRunConfig {
        workers: config.workers.concurrency,
        command: config.runner.command.clone(),
        strategy: format!("{:?}", config.runner.strategy).to_lowercase(),
        pattern: config.runner.pattern.clone(),
    }
}

/// Build the summary for a finished run
pub fn build_run_summary(report: &PoolReport, config: &Config) -> JsonRunSummary {
    JsonRunSummary {
        run_info: JsonRunInfo {
            start_time: report.started_at.clone(),
            end_time: chrono::Utc::now().to_rfc3339(),
            duration: JsonDuration::from_duration(report.duration),
            config: build_run_config(config),
        },
        total_items: report.total_items,
        dispatched: report.dispatched,
        success: report.success(),
        dispatch_error: report.dispatch_error.clone(),
        workers: report
            .workers
            .iter()
            .map(|w| JsonWorkerResult {
                rank: w.rank,
                pid: w.pid,
                exit_code: w.exit_code,
                signal: w.signal,
                success: w.success,
                capture_path: w.capture_path.display().to_string(),
            })
            .collect(),
    }
}

/// Write JSON summary to file
pub fn write_json_summary(output_path: &Path, summary: &JsonRunSummary, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON summary: {}", output_path.display()))?;

    if pretty {
        serde_json::to_writer_pretty(file, summary)?;
    } else {
        serde_json::to_writer(file, summary)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerReport;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_report() -> PoolReport {
        PoolReport {
            started_at: "2024-05-01T12:00:00+00:00".to_string(),
            duration: Duration::from_millis(2500),
            total_items: 4,
            dispatched: 4,
            workers: vec![
                WorkerReport {
                    rank: 0,
                    pid: 100,
                    exit_code: Some(0),
                    signal: None,
                    success: true,
                    capture_path: PathBuf::from("/tmp/specpool-worker-100"),
                },
                WorkerReport {
                    rank: 1,
                    pid: 101,
                    exit_code: Some(1),
                    signal: None,
                    success: false,
                    capture_path: PathBuf::from("/tmp/specpool-worker-101"),
                },
            ],
            dispatch_error: None,
        }
    }

    #[test]
    fn test_format_duration_human() {
        assert_eq!(format_duration_human(Duration::ZERO), "0µs");
        assert_eq!(format_duration_human(Duration::from_micros(250)), "250µs");
        assert_eq!(format_duration_human(Duration::from_millis(2500)), "2.500s");
        assert_eq!(format_duration_human(Duration::from_secs(90)), "1.50m");
    }

    #[test]
    fn test_build_run_summary() {
        let mut config = Config::default();
        config.workers.concurrency = 2;
        config.runner.command = vec!["sh".to_string()];

        let summary = build_run_summary(&sample_report(), &config);
        assert!(!summary.success);
        assert_eq!(summary.workers.len(), 2);
        assert_eq!(summary.run_info.config.strategy, "batch");
        assert_eq!(summary.run_info.duration.micros, 2_500_000);
    }

    #[test]
    fn test_write_json_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.json");
        let summary = build_run_summary(&sample_report(), &Config::default());

        write_json_summary(&path, &summary, true).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_items"], 4);
        assert_eq!(value["workers"][1]["exit_code"], 1);
        assert_eq!(value["workers"][0]["capture_path"], "/tmp/specpool-worker-100");
        assert!(value.get("dispatch_error").is_none());
    }
}
