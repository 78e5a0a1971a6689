//! Logging setup
//!
//! Provides the log level type and subscriber initialization. The orchestrator
//! logs to stderr; worker processes log into their capture file because their
//! stderr is redirected before the subscriber writes anything. Colors are
//! only used when the orchestrator's stderr is a terminal, so capture files
//! stay plain text.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Filter for `level`, unless `RUST_LOG` says otherwise
fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("specpool={}", level.to_tracing_level())))
}

fn build_subscriber<W>(
    filter: EnvFilter,
    ansi: bool,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .finish()
}

/// Initialize the global subscriber on stderr. Later calls are ignored.
pub fn init_logger(level: LogLevel, ansi: bool) {
    let _ = build_subscriber(build_filter(level), ansi, std::io::stderr).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("unknown"), None);
    }

    #[test]
    fn test_to_tracing_level() {
        assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
        assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logger(LogLevel::Warn, false);
        init_logger(LogLevel::Debug, false);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn render(ansi: bool) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber =
            build_subscriber(EnvFilter::new("specpool=info"), ansi, move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Socket error while fetching work");
        });

        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_plain_output_has_no_escape_codes() {
        let output = render(false);
        assert!(output.contains("Socket error while fetching work"));
        assert!(!output.contains('\x1b'), "escape codes in {:?}", output);
    }

    #[test]
    fn test_colored_output_when_requested() {
        assert!(render(true).contains('\x1b'));
    }
}
