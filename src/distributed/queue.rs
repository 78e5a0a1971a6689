//! Work queue and dispatch accounting owned by the coordinator

use std::collections::HashSet;
use std::fmt;

/// Remaining work items
///
/// Built once from the full item list with duplicates removed (first
/// occurrence wins), then popped from the back until empty. The queue never
/// grows after construction.
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    items: Vec<String>,
}

impl WorkQueue {
    /// Build a queue from an item list, dropping repeated entries.
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .map(Into::into)
            .filter(|item: &String| seen.insert(item.clone()))
            .collect();

        Self { items }
    }

    /// Pop the most recently queued item.
    pub fn pop(&mut self) -> Option<String> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Dispatch progress: how many items have been handed out out of the initial total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchCounter {
    dispatched: usize,
    total: usize,
}

impl DispatchCounter {
    pub fn new(total: usize) -> Self {
        Self {
            dispatched: 0,
            total,
        }
    }

    /// Record one dispatch and return the new count (1-based).
    pub fn record(&mut self) -> usize {
        self.dispatched += 1;
        self.dispatched
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// True once every initial item has been handed out.
    pub fn is_complete(&self) -> bool {
        self.dispatched >= self.total
    }
}

impl fmt::Display for DispatchCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} / {}]", self.dispatched, self.total)
    }
}
