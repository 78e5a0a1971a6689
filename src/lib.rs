//! specpool - parallel test-file runner
//!
//! specpool spreads a list of test files over several worker processes. A
//! coordinator in the parent process hands out one file per request over a
//! local Unix socket; workers keep pulling until the list is empty, then run
//! everything they collected through the configured test command.
//!
//! # Architecture
//!
//! - **Coordinator**: LIFO work queue behind a two-verb protocol (`PING`, `POP`)
//! - **Workers**: separate processes, one fresh test engine each
//! - **Pool**: binds the coordinator, spawns and reaps workers, prints their output
//! - **Engines**: pluggable test runners (external command, mock)

pub mod config;
pub mod distributed;
pub mod engine;
pub mod output;
pub mod pool;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use engine::TestEngine;
pub use pool::{Pool, PoolReport};
pub use worker::Worker;

/// Result type used throughout specpool
pub type Result<T> = anyhow::Result<T>;
