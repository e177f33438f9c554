// Acquire/release behaviour of the pool against a mock resource source
mod common;

use common::{MockError, MockSource, eventually, mock_pool};
use page_pool::{ConfigError, Pool, PoolConfig, PoolError, PoolStats};
use std::time::Duration;

#[tokio::test]
async fn test_round_trip_leaves_stats_unchanged() {
    let config = PoolConfig::builder().init_active(1).build().unwrap();
    let (pool, source) = mock_pool(config).await;

    let before = pool.stats();
    assert_eq!(
        before,
        PoolStats {
            active_count: 1,
            idle_count: 1,
            ..PoolStats::default()
        }
    );

    let guard = pool.acquire().await.unwrap();
    assert_eq!(pool.stats().in_use(), 1);
    guard.release().await;

    assert_eq!(pool.stats(), before);
    assert_eq!(source.created(), 1);
    assert_eq!(source.closed(), 0);
}

#[tokio::test]
async fn test_init_active_precreates_idle_handles() {
    let config = PoolConfig::builder()
        .init_active(3)
        .max_idle(5)
        .max_active(6)
        .build()
        .unwrap();
    let (pool, source) = mock_pool(config).await;

    assert_eq!(source.created(), 3);
    assert_eq!(pool.active_count(), 3);
    assert_eq!(pool.idle_count(), 3);
}

#[tokio::test]
async fn test_init_active_beyond_max_idle_is_trimmed() {
    let config = PoolConfig::builder().init_active(4).max_idle(2).build().unwrap();
    let (pool, source) = mock_pool(config).await;

    assert_eq!(source.created(), 4);
    assert_eq!(source.closed(), 2);
    assert_eq!(pool.active_count(), 2);
    assert_eq!(pool.idle_count(), 2);
}

#[tokio::test]
async fn test_init_failure_closes_created_handles() {
    let source = MockSource::new();
    source.fail_creates_after(2);
    let config = PoolConfig::builder()
        .init_active(3)
        .max_idle(5)
        .build()
        .unwrap();

    let err = Pool::new(source.clone(), config).await.unwrap_err();
    assert!(matches!(err, PoolError::Create(MockError::CreateFailed)));
    assert_eq!(source.created(), 2);
    assert_eq!(source.closed(), 2);
}

#[test]
fn test_init_active_above_max_active_is_rejected() {
    let err = PoolConfig::builder()
        .init_active(7)
        .max_active(6)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::InitExceedsMaxActive {
            init_active: 7,
            max_active: 6
        }
    );
}

#[tokio::test]
async fn test_idle_reuse_is_lifo() {
    let config = PoolConfig::builder().max_idle(3).build().unwrap();
    let (pool, _source) = mock_pool(config).await;

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    let second_serial = second.serial();
    first.release().await;
    second.release().await;

    let reused = pool.acquire().await.unwrap();
    assert_eq!(reused.serial(), second_serial);
}

#[tokio::test]
async fn test_exhausted_without_wait() {
    let config = PoolConfig::builder().max_active(2).build().unwrap();
    let (pool, _source) = mock_pool(config).await;

    let a = pool.acquire().await.unwrap();
    let _b = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::Exhausted));
    assert_eq!(pool.active_count(), 2);

    a.release().await;
    let c = pool.acquire().await.unwrap();
    assert_eq!(pool.active_count(), 2);
    drop(c);
}

#[tokio::test]
async fn test_unbounded_pool_never_exhausts() {
    let (pool, source) = mock_pool(PoolConfig::default()).await;

    let mut guards = Vec::new();
    for _ in 0..50 {
        guards.push(pool.acquire().await.unwrap());
    }
    assert_eq!(pool.active_count(), 50);
    assert_eq!(source.created(), 50);

    for guard in guards {
        guard.release().await;
    }
    // Default max_idle keeps two
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.active_count(), 2);
    assert_eq!(source.closed(), 48);
}

#[tokio::test]
async fn test_create_failure_rolls_back_active() {
    let config = PoolConfig::builder().max_active(1).build().unwrap();
    let (pool, source) = mock_pool(config).await;
    source.fail_creates();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::Create(MockError::CreateFailed)));
    assert_eq!(pool.active_count(), 0);

    source.allow_creates();
    let guard = pool.acquire().await.unwrap();
    assert_eq!(pool.active_count(), 1);
    guard.release().await;
}

#[tokio::test]
async fn test_unhealthy_idle_handle_is_replaced() {
    let config = PoolConfig::builder().init_active(2).build().unwrap();
    let (pool, source) = mock_pool(config).await;
    source.set_unhealthy(true);

    // Both idle handles fail the probe, a fresh one is created
    let guard = pool.acquire().await.unwrap();
    assert_eq!(guard.serial(), 2);
    assert_eq!(source.probes(), 2);
    assert_eq!(source.closed_serials(), vec![1, 0]);
    assert_eq!(pool.active_count(), 1);
    assert_eq!(pool.idle_count(), 0);
}

#[tokio::test]
async fn test_marked_broken_handle_is_closed_on_release() {
    let (pool, source) = mock_pool(PoolConfig::default()).await;

    let mut guard = pool.acquire().await.unwrap();
    guard.mark_broken();
    assert!(guard.is_broken());
    guard.release().await;

    assert_eq!(source.closed(), 1);
    assert_eq!(pool.stats(), PoolStats::default());
}

#[tokio::test]
async fn test_resource_reporting_broken_is_closed_on_release() {
    let (pool, source) = mock_pool(PoolConfig::default()).await;

    let guard = pool.acquire().await.unwrap();
    guard.set_broken();
    assert!(guard.is_broken());
    guard.release().await;

    assert_eq!(source.closed(), 1);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn test_dropped_guard_is_released() {
    let (pool, source) = mock_pool(PoolConfig::default()).await;

    let guard = pool.acquire().await.unwrap();
    drop(guard);

    eventually(|| pool.idle_count() == 1).await;
    assert_eq!(pool.active_count(), 1);
    assert_eq!(source.closed(), 0);
}

fn current_thread_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn test_guard_dropped_outside_runtime_returns_token() {
    let rt = current_thread_runtime();
    let config = PoolConfig::builder()
        .max_idle(0)
        .max_active(1)
        .wait(true)
        .build()
        .unwrap();
    let (pool, source) = rt.block_on(mock_pool(config));

    let guard = rt.block_on(pool.acquire()).unwrap();
    drop(guard);

    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(source.closed(), 0);

    let again = rt.block_on(pool.acquire_timeout(Duration::from_secs(1)));
    assert!(again.is_ok());
}

#[test]
fn test_guard_dropped_outside_runtime_is_parked() {
    let rt = current_thread_runtime();
    let config = PoolConfig::builder()
        .max_idle(1)
        .max_active(1)
        .wait(true)
        .build()
        .unwrap();
    let (pool, source) = rt.block_on(mock_pool(config));

    let guard = rt.block_on(pool.acquire()).unwrap();
    let serial = guard.serial();
    drop(guard);

    assert_eq!(pool.active_count(), 1);
    assert_eq!(pool.idle_count(), 1);

    let again = rt
        .block_on(pool.acquire_timeout(Duration::from_secs(1)))
        .unwrap();
    assert_eq!(again.serial(), serial);
    assert_eq!(source.created(), 1);
}

#[tokio::test]
async fn test_handle_ids_are_unique() {
    let (pool, _source) = mock_pool(PoolConfig::default()).await;

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id(), b.id());
    assert!(b.created_at() >= a.created_at());
}
