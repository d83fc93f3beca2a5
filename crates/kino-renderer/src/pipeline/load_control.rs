//! Shared load control
//!
//! One load control per build. It owns the allocator segment size and
//! tracks the buffer budget each live sample source has reserved, so the
//! total memory a renderer set may hold is known up front.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Handle for one registered budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoaderId(u64);

/// Allocator sizing and budget registry shared by sample sources
#[derive(Debug)]
pub struct LoadControl {
    segment_size: usize,
    next_id: AtomicU64,
    budgets: Mutex<HashMap<LoaderId, usize>>,
}

impl LoadControl {
    pub fn new(segment_size: usize) -> Self {
        Self {
            segment_size,
            next_id: AtomicU64::new(0),
            budgets: Mutex::new(HashMap::new()),
        }
    }

    /// Allocator segment size in bytes
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Reserve `budget` bytes for a new loader
    pub fn register(&self, budget: usize) -> LoaderId {
        let id = LoaderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.budgets.lock().insert(id, budget);
        debug!(loader = id.0, budget, "Loader registered");
        id
    }

    /// Release a loader's reservation
    pub fn unregister(&self, id: LoaderId) {
        if let Some(budget) = self.budgets.lock().remove(&id) {
            debug!(loader = id.0, budget, "Loader unregistered");
        }
    }

    /// Sum of all live reservations
    pub fn total_budget(&self) -> usize {
        self.budgets.lock().values().sum()
    }

    /// Number of live loaders
    pub fn loader_count(&self) -> usize {
        self.budgets.lock().len()
    }
}
