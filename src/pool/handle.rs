//! Pooled handle metadata and the RAII checkout guard

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::Pool;
use crate::resource::{Resource, ResourceSource};

// =============================================================================
// Pooled Handle
// =============================================================================

/// A resource plus the timestamps the pool evicts by
#[derive(Debug)]
pub(crate) struct PooledHandle<R> {
    /// Unique identifier within the owning pool
    id: u64,
    /// The wrapped resource
    resource: R,
    /// When the resource was created
    created_at: Instant,
    /// When the handle was last parked in the idle list
    returned_at: Option<Instant>,
}

impl<R: Resource> PooledHandle<R> {
    pub(crate) fn new(id: u64, resource: R, created_at: Instant) -> Self {
        Self {
            id,
            resource,
            created_at,
            returned_at: None,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn resource(&self) -> &R {
        &self.resource
    }

    pub(crate) fn mark_returned(&mut self, at: Instant) {
        self.returned_at = Some(at);
    }

    /// Idle strictly longer than `timeout` as of `now`
    pub(crate) fn idle_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.returned_at
            .and_then(|at| at.checked_add(timeout))
            .is_some_and(|limit| limit < now)
    }

    /// Reached `lifetime` as of `now`
    pub(crate) fn lifetime_exceeded(&self, now: Instant, lifetime: Duration) -> bool {
        now.saturating_duration_since(self.created_at) >= lifetime
    }

    pub(crate) fn into_resource(self) -> R {
        self.resource
    }
}

// =============================================================================
// RAII Guard
// =============================================================================

/// A handle checked out of a [`Pool`]
///
/// Dereferences to the pooled resource. Call [`PoolGuard::release`] to give
/// it back and wait for the pool to finish bookkeeping; dropping the guard
/// releases it in a background task instead.
pub struct PoolGuard<S: ResourceSource> {
    handle: Option<PooledHandle<S::Resource>>,
    pool: Pool<S>,
    broken: bool,
}

impl<S: ResourceSource> PoolGuard<S> {
    pub(crate) fn new(pool: Pool<S>, handle: PooledHandle<S::Resource>) -> Self {
        Self {
            handle: Some(handle),
            pool,
            broken: false,
        }
    }

    fn handle(&self) -> &PooledHandle<S::Resource> {
        self.handle.as_ref().expect("handle present until release")
    }

    /// Get reference to the checked-out resource
    pub fn resource(&self) -> &S::Resource {
        &self.handle().resource
    }

    /// Get mutable reference to the checked-out resource
    pub fn resource_mut(&mut self) -> &mut S::Resource {
        &mut self
            .handle
            .as_mut()
            .expect("handle present until release")
            .resource
    }

    /// Pool-unique id of the handle
    pub fn id(&self) -> u64 {
        self.handle().id
    }

    /// When the underlying resource was created
    pub fn created_at(&self) -> Instant {
        self.handle().created_at
    }

    /// Close the resource on release instead of parking it for reuse
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// True when the handle will be closed rather than reused on release
    pub fn is_broken(&self) -> bool {
        self.broken || self.handle.as_ref().is_some_and(|h| h.resource.is_broken())
    }

    /// Return the handle to its pool
    ///
    /// Parks it in the idle list, or closes it when the pool is closed, the
    /// handle is broken, or the idle list is full.
    pub async fn release(mut self) {
        let force_close = self.is_broken();
        if let Some(handle) = self.handle.take() {
            self.pool.put(handle, force_close).await;
        }
    }
}

impl<S: ResourceSource> Deref for PoolGuard<S> {
    type Target = S::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource()
    }
}

impl<S: ResourceSource> DerefMut for PoolGuard<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource_mut()
    }
}

impl<S: ResourceSource> fmt::Debug for PoolGuard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolGuard")
            .field("id", &self.handle.as_ref().map(|h| h.id))
            .field("broken", &self.broken)
            .finish()
    }
}

impl<S: ResourceSource> Drop for PoolGuard<S> {
    fn drop(&mut self) {
        let force_close = self.is_broken();
        let Some(handle) = self.handle.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Guard for page {} dropped, releasing in background", handle.id);
                let pool = self.pool.clone();
                runtime.spawn(async move {
                    pool.put(handle, force_close).await;
                });
            }
            Err(_) => {
                warn!(
                    "Guard for page {} dropped outside a runtime, releasing without close",
                    handle.id
                );
                self.pool.put_blocking(handle, force_close);
            }
        }
    }
}
