//! Accessors for `PoolConfig`

use std::time::Duration;

use super::types::PoolConfig;

impl PoolConfig {
    #[must_use]
    pub fn init_active(&self) -> usize {
        self.init_active
    }

    #[must_use]
    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    #[must_use]
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    #[must_use]
    pub fn wait(&self) -> bool {
        self.wait
    }

    #[must_use]
    pub fn max_conn_lifetime(&self) -> Option<Duration> {
        self.max_conn_lifetime
    }

    /// True when `acquire` goes through the admission semaphore
    #[must_use]
    pub fn uses_admission(&self) -> bool {
        self.wait && self.max_active > 0
    }
}
