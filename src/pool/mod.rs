//! Bounded pool of reusable handles
//!
//! The pool tracks how many handles exist (`active`), keeps returned handles
//! in a recency-ordered idle list, evicts them by idleness, age and idle
//! capacity, and optionally makes callers wait for admission when the
//! `max_active` limit is reached.
//!
//! All bookkeeping sits behind one lock. The lock is never held across an
//! `.await`: creating, probing and closing resources always happens with the
//! lock released and is bracketed by re-acquisition.

pub mod admission;
pub mod handle;
pub mod idle_list;
pub mod stats;

use futures::future::join_all;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

pub use admission::WaitContext;
pub use handle::PoolGuard;
pub use idle_list::IdleList;
pub use stats::PoolStats;

use admission::WaitAbort;
use handle::PooledHandle;
use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::resource::{Resource, ResourceSource, SourceError};

/// State guarded by the pool lock
struct PoolState<R> {
    /// Set once by `close`, never cleared
    closed: bool,
    /// Handles alive: idle plus checked out
    active: usize,
    /// Parked handles, most recently returned first
    idle: IdleList<PooledHandle<R>>,
    wait_count: u64,
    wait_duration: Duration,
}

struct PoolInner<S: ResourceSource> {
    source: S,
    config: PoolConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<PoolState<S::Resource>>,
    /// Created on the first blocking acquire
    admission: OnceLock<Semaphore>,
    next_id: AtomicU64,
}

/// Bounded pool of handles produced by a [`ResourceSource`]
///
/// Cloning is cheap; clones share the same pool.
pub struct Pool<S: ResourceSource> {
    inner: Arc<PoolInner<S>>,
}

impl<S: ResourceSource> Clone for Pool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ResourceSource> Pool<S> {
    /// Build a pool and pre-create `init_active` handles
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Config`] for an invalid configuration and
    /// [`PoolError::Create`] if any initial handle fails to be created. In the
    /// latter case the handles created so far are closed before returning.
    pub async fn new(source: S, config: PoolConfig) -> PoolResult<Self, SourceError<S>> {
        Self::with_clock(source, config, Arc::new(SystemClock)).await
    }

    /// Like [`Pool::new`] with an explicit time source for eviction decisions
    ///
    /// # Errors
    ///
    /// See [`Pool::new`].
    pub async fn with_clock(
        source: S,
        config: PoolConfig,
        clock: Arc<dyn Clock>,
    ) -> PoolResult<Self, SourceError<S>> {
        config.validate()?;

        let pool = Self {
            inner: Arc::new(PoolInner {
                source,
                state: Mutex::new(PoolState {
                    closed: false,
                    active: 0,
                    idle: IdleList::with_capacity(config.max_idle()),
                    wait_count: 0,
                    wait_duration: Duration::ZERO,
                }),
                config,
                clock,
                admission: OnceLock::new(),
                next_id: AtomicU64::new(0),
            }),
        };

        info!("Starting page pool with config: {:?}", pool.inner.config);

        for _ in 0..pool.inner.config.init_active() {
            pool.inner.state.lock().active += 1;
            match pool.create_handle().await {
                Ok(handle) => pool.put(handle, false).await,
                Err(e) => {
                    pool.inner.state.lock().active -= 1;
                    warn!("Failed to pre-create page for pool: {}", e);
                    pool.close().await;
                    return Err(PoolError::Create(e));
                }
            }
        }

        debug!(
            "Page pool started with {} idle pages",
            pool.inner.state.lock().idle.len()
        );
        Ok(pool)
    }

    /// Acquire a handle, waiting for admission without deadline if needed
    ///
    /// # Errors
    ///
    /// See [`Pool::acquire_with`].
    pub async fn acquire(&self) -> PoolResult<PoolGuard<S>, SourceError<S>> {
        self.acquire_with(&WaitContext::background()).await
    }

    /// Acquire a handle, waiting at most `timeout` for admission
    ///
    /// # Errors
    ///
    /// See [`Pool::acquire_with`].
    pub async fn acquire_timeout(
        &self,
        timeout: Duration,
    ) -> PoolResult<PoolGuard<S>, SourceError<S>> {
        self.acquire_with(&WaitContext::background().with_timeout(timeout))
            .await
    }

    /// Acquire a handle: reuse a healthy idle one or create a new one
    ///
    /// `ctx` only bounds the admission wait of a blocking pool. Creation and
    /// health checks run to completion once admission is granted.
    ///
    /// # Errors
    ///
    /// - [`PoolError::WaitCanceled`] / [`PoolError::WaitTimedOut`] when `ctx`
    ///   fires during the admission wait
    /// - [`PoolError::Closed`] after [`Pool::close`]
    /// - [`PoolError::Exhausted`] in non-blocking mode at the `max_active` limit
    /// - [`PoolError::Create`] when the source fails to create a handle
    pub async fn acquire_with(
        &self,
        ctx: &WaitContext,
    ) -> PoolResult<PoolGuard<S>, SourceError<S>> {
        let mut reservation = Reservation::new(self);

        if self.inner.config.uses_admission() {
            let waited = admission::take_token(self.admission(), ctx)
                .await
                .map_err(|abort| match abort {
                    WaitAbort::Canceled => PoolError::WaitCanceled,
                    WaitAbort::TimedOut(after) => PoolError::WaitTimedOut(after),
                    WaitAbort::Closed => PoolError::Closed,
                })?;
            reservation.token = true;

            if let Some(waited) = waited {
                let mut state = self.inner.state.lock();
                state.wait_count += 1;
                state.wait_duration += waited;
            }
        }

        self.prune_idle().await;

        while let Some(candidate) = self.pop_idle_front() {
            if !self.usable(&candidate).await {
                candidate.close().await;
                continue;
            }
            let Some(handle) = candidate.into_handle() else {
                continue;
            };
            reservation.commit();
            debug!("Acquired page {} from pool", handle.id());
            return Ok(PoolGuard::new(self.clone(), handle));
        }

        {
            let max_active = self.inner.config.max_active();
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            if !self.inner.config.wait() && max_active > 0 && state.active >= max_active {
                return Err(PoolError::Exhausted);
            }
            state.active += 1;
            reservation.slot = true;
        }

        match self.create_handle().await {
            Ok(handle) => {
                reservation.commit();
                debug!("Created page {} for acquire (no idle page)", handle.id());
                Ok(PoolGuard::new(self.clone(), handle))
            }
            Err(e) => {
                warn!("Failed to create page for pool: {}", e);
                Err(PoolError::Create(e))
            }
        }
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            active_count: state.active,
            idle_count: state.idle.len(),
            wait_count: state.wait_count,
            wait_duration: state.wait_duration,
        }
    }

    /// Handles alive, idle plus checked out
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Handles parked in the idle list
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    /// Close the pool and every idle handle
    ///
    /// Idempotent. Waiters blocked on admission fail with
    /// [`PoolError::Closed`], later acquires fail the same way, and handles
    /// still checked out are closed when they are released.
    pub async fn close(&self) {
        let detached = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let detached = state.idle.drain();
            state.active -= detached.len();
            if let Some(semaphore) = self.inner.admission.get() {
                semaphore.close();
            }
            detached
        };

        info!("Closing page pool with {} idle pages", detached.len());
        join_all(
            detached
                .into_iter()
                .map(|handle| handle.into_resource().close()),
        )
        .await;
    }

    /// Return a checked-out handle
    pub(crate) async fn put(&self, handle: PooledHandle<S::Resource>, force_close: bool) {
        let evicted = {
            let mut state = self.inner.state.lock();
            self.park_or_evict(&mut state, handle, force_close)
        };

        match evicted {
            Some(handle) => {
                debug!("Closing page {} on release", handle.id());
                Detached::new(self.clone(), handle)
                    .returning_token()
                    .close()
                    .await;
            }
            None => self.return_token(),
        }
    }

    /// `put` for callers that cannot await: evicted resources are dropped
    /// without being closed
    pub(crate) fn put_blocking(&self, handle: PooledHandle<S::Resource>, force_close: bool) {
        let mut state = self.inner.state.lock();
        let evicted = self.park_or_evict(&mut state, handle, force_close);

        if evicted.is_some() {
            state.active -= 1;
        }
        if !state.closed
            && let Some(semaphore) = self.inner.admission.get()
        {
            semaphore.add_permits(1);
        }
        drop(state);
        drop(evicted);
    }

    /// Park `handle` at the idle front, or hand back the handle that must be
    /// closed: itself when the pool is closed or `force_close` is set, the
    /// least recently returned one when the idle list overflows
    fn park_or_evict(
        &self,
        state: &mut PoolState<S::Resource>,
        mut handle: PooledHandle<S::Resource>,
        force_close: bool,
    ) -> Option<PooledHandle<S::Resource>> {
        if state.closed || force_close {
            return Some(handle);
        }
        handle.mark_returned(self.inner.clock.now());
        trace!("Returning page {} to idle list", handle.id());
        state.idle.push_front(handle);
        if state.idle.len() > self.inner.config.max_idle() {
            state.idle.pop_back()
        } else {
            None
        }
    }

    fn admission(&self) -> &Semaphore {
        let semaphore = self
            .inner
            .admission
            .get_or_init(|| Semaphore::new(self.inner.config.max_active()));
        // `close` may have run between initialisation and here.
        if self.inner.state.lock().closed {
            semaphore.close();
        }
        semaphore
    }

    fn return_token(&self) {
        let state = self.inner.state.lock();
        if !state.closed
            && let Some(semaphore) = self.inner.admission.get()
        {
            semaphore.add_permits(1);
        }
    }

    async fn create_handle(&self) -> Result<PooledHandle<S::Resource>, SourceError<S>> {
        let resource = self.inner.source.create().await?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(PooledHandle::new(id, resource, self.inner.clock.now()))
    }

    /// Close idle handles whose idle timeout elapsed, oldest first
    ///
    /// Bounded by the idle count seen on entry so handles returned meanwhile
    /// cannot keep the loop spinning.
    async fn prune_idle(&self) {
        let Some(timeout) = self.inner.config.idle_timeout() else {
            return;
        };

        let observed = self.idle_count();
        for _ in 0..observed {
            let stale = {
                let mut state = self.inner.state.lock();
                let now = self.inner.clock.now();
                let expired = state
                    .idle
                    .back()
                    .is_some_and(|handle| handle.idle_expired(now, timeout));
                if expired { state.idle.pop_back() } else { None }
            };
            let Some(stale) = stale else {
                break;
            };

            debug!("Removing idle page {} (idle timeout {:?})", stale.id(), timeout);
            Detached::new(self.clone(), stale).close().await;
        }
    }

    fn pop_idle_front(&self) -> Option<Detached<S>> {
        let handle = self.inner.state.lock().idle.pop_front()?;
        Some(Detached::new(self.clone(), handle))
    }

    /// Borrow-time health check plus lifetime check
    async fn usable(&self, candidate: &Detached<S>) -> bool {
        let Some(handle) = candidate.handle.as_ref() else {
            return false;
        };

        if let Err(e) = self.inner.source.test_on_borrow(handle.resource()).await {
            debug!("Page {} failed health check during acquire: {}", handle.id(), e);
            return false;
        }

        if let Some(lifetime) = self.inner.config.max_conn_lifetime()
            && handle.lifetime_exceeded(self.inner.clock.now(), lifetime)
        {
            debug!("Page {} exceeded max lifetime {:?}", handle.id(), lifetime);
            return false;
        }

        true
    }

    /// Bookkeeping for a handle that left the pool without being closed
    fn forget_handle(&self, return_token: bool) {
        let mut state = self.inner.state.lock();
        state.active -= 1;
        if return_token
            && !state.closed
            && let Some(semaphore) = self.inner.admission.get()
        {
            semaphore.add_permits(1);
        }
    }
}

impl<S> fmt::Debug for Pool<S>
where
    S: ResourceSource + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("source", &self.inner.source)
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// In-flight bookkeeping guards
// =============================================================================

/// Admission token and `active` slot held by an acquire that has not yet
/// produced a guard
///
/// Rolled back on drop, which covers both error returns and an acquire
/// future dropped mid-flight.
struct Reservation<'a, S: ResourceSource> {
    pool: &'a Pool<S>,
    token: bool,
    slot: bool,
}

impl<'a, S: ResourceSource> Reservation<'a, S> {
    fn new(pool: &'a Pool<S>) -> Self {
        Self {
            pool,
            token: false,
            slot: false,
        }
    }

    /// Ownership of the token and slot moves to the handed-out guard
    fn commit(&mut self) {
        self.token = false;
        self.slot = false;
    }
}

impl<S: ResourceSource> Drop for Reservation<'_, S> {
    fn drop(&mut self) {
        if !self.token && !self.slot {
            return;
        }
        let mut state = self.pool.inner.state.lock();
        if self.slot {
            state.active -= 1;
        }
        if self.token
            && !state.closed
            && let Some(semaphore) = self.pool.inner.admission.get()
        {
            semaphore.add_permits(1);
        }
    }
}

/// A live handle outside both the idle list and any guard
///
/// Closing it (or dropping it) decrements `active` exactly once, and returns
/// an admission token when it was detached on release.
struct Detached<S: ResourceSource> {
    pool: Pool<S>,
    handle: Option<PooledHandle<S::Resource>>,
    return_token: bool,
    /// Cleared once the handle is handed on to a guard
    armed: bool,
}

impl<S: ResourceSource> Detached<S> {
    fn new(pool: Pool<S>, handle: PooledHandle<S::Resource>) -> Self {
        Self {
            pool,
            handle: Some(handle),
            return_token: false,
            armed: true,
        }
    }

    fn returning_token(mut self) -> Self {
        self.return_token = true;
        self
    }

    /// Hand the handle on; the caller takes over its `active` slot
    fn into_handle(mut self) -> Option<PooledHandle<S::Resource>> {
        self.armed = false;
        self.handle.take()
    }

    async fn close(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.into_resource().close().await;
        }
    }
}

impl<S: ResourceSource> Drop for Detached<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(handle) = self.handle.take() else {
            self.pool.forget_handle(self.return_token);
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let detached = Detached {
                    pool: self.pool.clone(),
                    handle: Some(handle),
                    return_token: self.return_token,
                    armed: true,
                };
                runtime.spawn(detached.close());
            }
            Err(_) => {
                drop(handle);
                self.pool.forget_handle(self.return_token);
            }
        }
    }
}
