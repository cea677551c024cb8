//! Runtime statistics of the propagation worker.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters since process start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub started_at: Option<DateTime<Utc>>,
    pub cycles: u64,
    pub candidates_seen: u64,
    pub delivered: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub current_in_flight: usize,
    pub last_cycle_candidates: usize,
    pub last_cycle_finished_at: Option<DateTime<Utc>>,
}

/// Shared, cloneable view of [`WorkerStats`].
#[derive(Debug, Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<WorkerStats>>,
}

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> WorkerStats {
        self.lock().clone()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut WorkerStats)) {
        f(&mut self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, WorkerStats> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
