//! Mock test engine for testing
//!
//! Records every loaded item and returns a scripted verdict without running
//! anything. Handles are cheap clones sharing the same state, so a test can
//! keep one handle while the worker owns another.
//!
//! # Example
//!
//! ```
//! use specpool::engine::TestEngine;
//! use specpool::engine::mock::MockEngine;
//!
//! let engine = MockEngine::new();
//! let mut worker_side = engine.clone();
//! worker_side.load("spec/a_spec.rb").unwrap();
//! assert!(worker_side.run_all().unwrap());
//!
//! assert_eq!(engine.loaded_items(), vec!["spec/a_spec.rb".to_string()]);
//! assert_eq!(engine.run_count(), 1);
//! ```

use super::TestEngine;
use crate::Result;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    loaded: Vec<String>,
    runs: usize,
    should_fail: bool,
    reject: Vec<String>,
}

/// Mock test engine
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    /// Create a mock that accepts every item and passes
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `run_all` report failure
    pub fn set_should_fail(&self, should_fail: bool) {
        self.lock().should_fail = should_fail;
    }

    /// Make `load` fail for this item
    pub fn reject(&self, item: impl Into<String>) {
        self.lock().reject.push(item.into());
    }

    /// Items successfully loaded, in load order
    pub fn loaded_items(&self) -> Vec<String> {
        self.lock().loaded.clone()
    }

    /// Number of `run_all` calls
    pub fn run_count(&self) -> usize {
        self.lock().runs
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded state from others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TestEngine for MockEngine {
    fn load(&mut self, item: &str) -> Result<()> {
        let mut state = self.lock();
        if state.reject.iter().any(|r| r == item) {
            anyhow::bail!("Mock load failure: {}", item);
        }
        state.loaded.push(item.to_string());
        Ok(())
    }

    fn run_all(&mut self) -> Result<bool> {
        let mut state = self.lock();
        state.runs += 1;
        Ok(!state.should_fail)
    }

    fn loaded(&self) -> usize {
        self.lock().loaded.len()
    }
}
