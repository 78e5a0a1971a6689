//! Worker implementation
//!
//! A worker pulls test files from the coordinator one at a time and registers
//! each with its test engine. When the coordinator has nothing left it runs
//! everything it loaded, and the verdict becomes the process exit status.
//!
//! # States
//!
//! ```text
//! STARTING -> HEALTHCHECKING -> LOADING -> EXECUTING -> DONE
//! ```
//!
//! - **HEALTHCHECKING**: connect and `PING` until the coordinator answers,
//!   sleeping a fixed interval between attempts
//! - **LOADING**: `POP` items until the coordinator is gone (exhaustion) or a
//!   transport error occurs; either way the worker moves on with what it has
//! - **EXECUTING**: `run_all` on the engine
//!
//! # Example
//!
//! ```no_run
//! use specpool::distributed::SocketBuilder;
//! use specpool::engine::mock::MockEngine;
//! use specpool::worker::{Worker, WorkerOptions};
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
//! let builder = SocketBuilder::new("/tmp/specpool-1234.sock");
//! let mut worker = Worker::new(0, builder, MockEngine::new(), WorkerOptions::default());
//! let passed = worker.run(&runtime)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod capture;
pub mod process;

use crate::distributed::{PopOutcome, SocketBuilder};
use crate::distributed::protocol::PING_REPLY;
use crate::engine::TestEngine;
use crate::Result;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub use process::{export_worker_env, run_worker_main, WorkerIdentity, RANK_ENV_VAR};

/// Default pause between health-check attempts
pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Healthchecking,
    Loading,
    Executing,
    Done,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Healthchecking => "healthchecking",
            Self::Loading => "loading",
            Self::Executing => "executing",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Worker tuning
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Pause between health-check attempts
    pub healthcheck_interval: Duration,

    /// Give up after this many failed health-check attempts (`None` = never)
    pub max_healthcheck_attempts: Option<u32>,

    /// Keep retrying while the socket does not exist yet
    ///
    /// Set to `false` when the coordinator is known to have bound its socket
    /// before this worker started: a missing socket then means the
    /// coordinator already finished, and the worker skips straight to loading.
    pub retry_until_bound: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            healthcheck_interval: DEFAULT_HEALTHCHECK_INTERVAL,
            max_healthcheck_attempts: None,
            retry_until_bound: true,
        }
    }
}

/// A single worker bound to one coordinator and one engine
pub struct Worker<E: TestEngine> {
    rank: usize,
    builder: SocketBuilder,
    engine: E,
    options: WorkerOptions,
    state: WorkerState,
    /// Items received from the coordinator
    received: usize,
    /// Items the engine refused to load
    load_failures: usize,
}

impl<E: TestEngine> Worker<E> {
    pub fn new(rank: usize, builder: SocketBuilder, engine: E, options: WorkerOptions) -> Self {
        debug!("Initialize worker[{}]", rank);
        Self {
            rank,
            builder,
            engine,
            options,
            state: WorkerState::Starting,
            received: 0,
            load_failures: 0,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Items received from the coordinator so far
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn load_failures(&self) -> usize {
        self.load_failures
    }

    /// Run the whole lifecycle: fetch on `runtime`, then execute.
    pub fn run(&mut self, runtime: &tokio::runtime::Runtime) -> Result<bool> {
        runtime.block_on(self.fetch())?;
        self.execute()
    }

    /// Health-check the coordinator, then load items until exhaustion.
    ///
    /// Returns the number of items received.
    pub async fn fetch(&mut self) -> Result<usize> {
        self.healthcheck().await?;
        Ok(self.load_items().await)
    }

    /// Wait until the coordinator answers a `PING`.
    pub async fn healthcheck(&mut self) -> Result<()> {
        self.state = WorkerState::Healthchecking;
        let mut attempts: u32 = 0;

        loop {
            match self.builder.ping().await {
                Ok(Some(reply)) => {
                    if reply != PING_REPLY {
                        warn!("Unexpected PING reply: {:?}", reply);
                    }
                    debug!("Coordinator is ready");
                    return Ok(());
                }
                Ok(None) if !self.options.retry_until_bound => {
                    info!("Coordinator socket is gone, nothing left to fetch");
                    return Ok(());
                }
                Ok(None) => {
                    debug!("Sleep a little to wait for the coordinator");
                }
                Err(e) => {
                    warn!("Health check failed: {}", e);
                }
            }

            attempts += 1;
            if let Some(max) = self.options.max_healthcheck_attempts {
                if attempts >= max {
                    anyhow::bail!(
                        "Coordinator at {} did not respond after {} attempts",
                        self.builder.path().display(),
                        attempts
                    );
                }
            }
            tokio::time::sleep(self.options.healthcheck_interval).await;
        }
    }

    /// Pop items until the coordinator is exhausted or the channel fails.
    ///
    /// Transport errors end the loop early; whatever was already loaded still
    /// runs. Returns the number of items received.
    pub async fn load_items(&mut self) -> usize {
        self.state = WorkerState::Loading;
        let before = self.received;

        loop {
            debug!("Send POP request");
            match self.builder.pop(self.rank).await {
                Ok(PopOutcome::Item(item)) => {
                    self.received += 1;
                    debug!("Load {}", item);
                    if let Err(e) = self.engine.load(&item) {
                        error!("Failed to load {}: {:#}", item, e);
                        self.load_failures += 1;
                    }
                }
                Ok(PopOutcome::Exhausted) => {
                    debug!("Coordinator has no more items");
                    break;
                }
                Err(e) => {
                    error!("Socket error while fetching work: {}", e);
                    break;
                }
            }
        }

        self.received - before
    }

    /// Run everything loaded. Load failures count as a failed run.
    pub fn execute(&mut self) -> Result<bool> {
        self.state = WorkerState::Executing;
        info!(
            "worker[{}] running {} loaded item(s)",
            self.rank,
            self.engine.loaded()
        );

        let result = self.engine.run_all();
        self.state = WorkerState::Done;

        let passed = result?;
        Ok(passed && self.load_failures == 0)
    }
}
