//! Capabilities the pool needs from the things it pools
//!
//! The pool knows nothing about browsers. It creates handles through a
//! [`ResourceSource`], probes and closes them through [`Resource`], and hands
//! the raw handle to callers through [`PoolGuard`](crate::pool::PoolGuard).

use std::future::Future;

/// A pooled handle: something that can be probed and closed
pub trait Resource: Send + Sync + 'static {
    /// Error reported by probes and by the owning source's `create`
    type Error: std::error::Error + Send + Sync + 'static;

    /// Liveness probe used before an idle handle is reused
    fn health_probe(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Release the underlying resource; failures are logged by the implementor
    fn close(self) -> impl Future<Output = ()> + Send;

    /// True when the handle ended up in an error state while checked out.
    /// Broken handles are closed on release instead of being parked.
    fn is_broken(&self) -> bool {
        false
    }
}

/// Factory for pooled handles
pub trait ResourceSource: Send + Sync + 'static {
    type Resource: Resource;

    /// Create a fresh handle
    fn create(
        &self,
    ) -> impl Future<Output = Result<Self::Resource, <Self::Resource as Resource>::Error>> + Send;

    /// Borrow-time health check ("test on borrow")
    ///
    /// Runs on every idle handle before it is handed out again. Failing it
    /// closes the handle and moves on to the next candidate. Defaults to the
    /// handle's own [`Resource::health_probe`].
    fn test_on_borrow<'a>(
        &'a self,
        resource: &'a Self::Resource,
    ) -> impl Future<Output = Result<(), <Self::Resource as Resource>::Error>> + Send + 'a {
        resource.health_probe()
    }
}

/// Error type produced by a source's resources
pub type SourceError<S> = <<S as ResourceSource>::Resource as Resource>::Error;
