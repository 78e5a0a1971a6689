//! Human-readable text output

use crate::pool::PoolReport;

/// Header printed before a worker's captured output
pub fn worker_header(rank: usize) -> String {
    format!("----> output from worker[{}]", rank)
}

/// Print one worker's captured output under its rank label
pub fn print_worker_output(rank: usize, output: &str) {
    println!("{}", worker_header(rank));
    print!("{}", output);
    if !output.is_empty() && !output.ends_with('\n') {
        println!();
    }
}

/// Render the run summary
pub fn format_summary(report: &PoolReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Dispatched {} of {} test file(s) to {} worker(s) in {:.3}s\n",
        report.dispatched,
        report.total_items,
        report.workers.len(),
        report.duration.as_secs_f64()
    ));

    for worker in &report.workers {
        out.push_str(&format!(
            "  worker[{}] (pid {}): {}\n",
            worker.rank,
            worker.pid,
            worker.status_text()
        ));
    }

    if let Some(error) = &report.dispatch_error {
        out.push_str(&format!("  coordinator: {}\n", error));
    }

    let failed = report.failed_workers().count();
    if report.success() {
        out.push_str("Result: PASSED\n");
    } else {
        out.push_str(&format!("Result: FAILED ({} worker(s) failed)\n", failed));
    }

    out
}

/// Print the run summary to stdout
pub fn print_summary(report: &PoolReport) {
    print!("{}", format_summary(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerReport;
    use std::path::PathBuf;
    use std::time::Duration;

    fn worker(rank: usize, exit_code: i32) -> WorkerReport {
        WorkerReport {
            rank,
            pid: 200 + rank as u32,
            exit_code: Some(exit_code),
            signal: None,
            success: exit_code == 0,
            capture_path: PathBuf::from(format!("/tmp/specpool-worker-{}", 200 + rank)),
        }
    }

    #[test]
    fn test_worker_header() {
        assert_eq!(worker_header(2), "----> output from worker[2]");
    }

    #[test]
    fn test_format_summary() {
        let report = PoolReport {
            started_at: String::new(),
            duration: Duration::from_millis(1200),
            total_items: 5,
            dispatched: 5,
            workers: vec![worker(0, 0), worker(1, 2)],
            dispatch_error: None,
        };

        let text = format_summary(&report);
        assert!(text.starts_with("Dispatched 5 of 5 test file(s) to 2 worker(s) in 1.200s"));
        assert!(text.contains("worker[0] (pid 200): passed"));
        assert!(text.contains("worker[1] (pid 201): failed (exit 2)"));
        assert!(text.ends_with("Result: FAILED (1 worker(s) failed)\n"));
    }
}
