//! Test utilities for the page pool test suite
//!
//! `MockSource` stands in for a browser: it hands out numbered resources and
//! records every creation, probe and close so tests can check the pool's
//! bookkeeping against what actually happened.

use page_pool::{Pool, PoolConfig, Resource, ResourceSource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MockError {
    #[error("mock create failed")]
    CreateFailed,
    #[error("mock resource {0} unhealthy")]
    Unhealthy(usize),
}

#[derive(Debug)]
pub struct MockState {
    created: AtomicUsize,
    probes: AtomicUsize,
    closed: Mutex<Vec<usize>>,
    /// Creations still allowed before failing; negative means unlimited
    create_budget: AtomicI64,
    unhealthy: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
}

/// Resource source with observable side effects
#[derive(Debug, Clone)]
pub struct MockSource {
    state: Arc<MockState>,
}

#[allow(dead_code)]
impl MockSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                created: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
                closed: Mutex::new(Vec::new()),
                create_budget: AtomicI64::new(-1),
                unhealthy: AtomicBool::new(false),
                create_delay: Mutex::new(None),
            }),
        }
    }

    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.lock().len()
    }

    pub fn closed_serials(&self) -> Vec<usize> {
        self.state.closed.lock().clone()
    }

    pub fn probes(&self) -> usize {
        self.state.probes.load(Ordering::SeqCst)
    }

    /// Resources created and not yet closed
    pub fn live(&self) -> usize {
        self.created() - self.closed()
    }

    /// Every create from now on fails
    pub fn fail_creates(&self) {
        self.state.create_budget.store(0, Ordering::SeqCst);
    }

    /// Allow `n` more creations, then fail
    pub fn fail_creates_after(&self, n: i64) {
        self.state.create_budget.store(n, Ordering::SeqCst);
    }

    pub fn allow_creates(&self) {
        self.state.create_budget.store(-1, Ordering::SeqCst);
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    pub fn set_create_delay(&self, delay: Option<Duration>) {
        *self.state.create_delay.lock() = delay;
    }

    /// Panics if any resource was closed twice
    pub fn assert_no_double_close(&self) {
        let mut serials = self.closed_serials();
        let total = serials.len();
        serials.sort_unstable();
        serials.dedup();
        assert_eq!(serials.len(), total, "a resource was closed more than once");
    }

    fn take_create_budget(&self) -> bool {
        self.state
            .create_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                b if b < 0 => Some(b),
                0 => None,
                b => Some(b - 1),
            })
            .is_ok()
    }
}

impl ResourceSource for MockSource {
    type Resource = MockResource;

    async fn create(&self) -> Result<MockResource, MockError> {
        let delay = *self.state.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.take_create_budget() {
            return Err(MockError::CreateFailed);
        }
        let serial = self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockResource {
            serial,
            state: Arc::clone(&self.state),
            broken: AtomicBool::new(false),
        })
    }
}

#[derive(Debug)]
pub struct MockResource {
    serial: usize,
    state: Arc<MockState>,
    broken: AtomicBool,
}

#[allow(dead_code)]
impl MockResource {
    /// Creation order, starting at 0
    pub fn serial(&self) -> usize {
        self.serial
    }

    pub fn set_broken(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl Resource for MockResource {
    type Error = MockError;

    async fn health_probe(&self) -> Result<(), MockError> {
        self.state.probes.fetch_add(1, Ordering::SeqCst);
        if self.state.unhealthy.load(Ordering::SeqCst) {
            return Err(MockError::Unhealthy(self.serial));
        }
        Ok(())
    }

    async fn close(self) {
        self.state.closed.lock().push(self.serial);
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }
}

/// Build a pool over a fresh mock source
#[allow(dead_code)]
pub async fn mock_pool(config: PoolConfig) -> (Pool<MockSource>, MockSource) {
    let source = MockSource::new();
    let pool = Pool::new(source.clone(), config)
        .await
        .expect("mock pool should start");
    (pool, source)
}

/// Poll `condition` until it holds or a second passes
///
/// Guard drops release in a spawned task, so their effect is not immediate.
#[allow(dead_code)]
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within a second"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
