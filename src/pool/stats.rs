//! Pool statistics snapshot

use serde::Serialize;
use std::time::Duration;

/// Point-in-time view of a pool's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Handles alive: idle plus checked out
    pub active_count: usize,
    /// Handles parked in the idle list
    pub idle_count: usize,
    /// Acquires that had to block for an admission token
    pub wait_count: u64,
    /// Total time spent blocked for admission tokens
    pub wait_duration: Duration,
}

impl PoolStats {
    /// Handles currently checked out by callers
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.active_count.saturating_sub(self.idle_count)
    }
}
