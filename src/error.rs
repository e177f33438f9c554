//! Error types for pool operations
//!
//! `PoolError` is generic over the error type of the resource source so a
//! creation failure reaches the caller verbatim.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pool operations
pub type PoolResult<T, E> = Result<T, PoolError<E>>;

/// Errors surfaced by [`Pool`](crate::pool::Pool) operations
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// Non-blocking mode and `max_active` handles already exist
    #[error("page pool exhausted")]
    Exhausted,

    /// `acquire` was called on a closed pool
    #[error("acquire on closed pool")]
    Closed,

    /// The caller's cancellation token fired while waiting for admission
    #[error("wait for a vacant page was canceled")]
    WaitCanceled,

    /// The caller's deadline passed while waiting for admission
    #[error("timed out after {0:?} waiting for a vacant page")]
    WaitTimedOut(Duration),

    /// The resource source failed to create a new handle
    #[error("failed to create pooled resource")]
    Create(#[source] E),

    /// The pool configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl<E> PoolError<E> {
    /// True for the two admission-wait failures
    #[must_use]
    pub fn is_wait_error(&self) -> bool {
        matches!(self, Self::WaitCanceled | Self::WaitTimedOut(_))
    }
}

/// Invalid pool configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// More handles requested at startup than the admission limit allows
    #[error("init_active ({init_active}) exceeds max_active ({max_active})")]
    InitExceedsMaxActive { init_active: usize, max_active: usize },

    /// Configuration file could not be read or parsed
    #[error("invalid pool configuration: {0}")]
    Parse(String),
}
