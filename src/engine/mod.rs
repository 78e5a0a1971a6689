//! Test engine abstraction
//!
//! A test engine is the collaborator that actually runs test files. Workers
//! know nothing about any particular test framework: they hand every work item
//! they receive to the engine's `load`, and once the coordinator has nothing
//! left they call `run_all` and turn its verdict into the process exit status.
//!
//! # Engine Types
//!
//! - **Command**: runs an external command (e.g. `rspec`, `pytest`, `sh`) over
//!   the loaded files, either in one batch or once per file
//! - **Mock**: records loads and returns a scripted verdict (tests only)
//!
//! # Example
//!
//! ```no_run
//! use specpool::engine::TestEngine;
//! use specpool::engine::command::{CommandEngine, ExecutionStrategy};
//!
//! let mut engine = CommandEngine::new(vec!["rspec".into()], ExecutionStrategy::Batch);
//! engine.load("spec/models/user_spec.rb")?;
//! engine.load("spec/models/post_spec.rb")?;
//! let passed = engine.run_all()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod command;
pub mod mock;

use crate::Result;

/// Test engine trait for all backends
///
/// Each worker process owns exactly one freshly constructed engine; engines are
/// never shared between workers, so implementations are free to keep
/// process-wide state.
pub trait TestEngine: Send {
    /// Register a work item for execution
    ///
    /// Called once per item received from the coordinator, before anything
    /// runs. Returning an error marks the item as failed but does not stop the
    /// worker from fetching more items.
    fn load(&mut self, item: &str) -> Result<()>;

    /// Execute everything registered so far
    ///
    /// Returns `Ok(true)` when every registered item passed. An engine with
    /// nothing registered succeeds.
    fn run_all(&mut self) -> Result<bool>;

    /// Number of items registered
    fn loaded(&self) -> usize;
}
