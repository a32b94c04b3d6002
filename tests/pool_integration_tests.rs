//! Integration Tests for the Resource Pool
//!
//! Exercises growth, waiting, eviction and shutdown through the public API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::Mutex;
use tokio_test::assert_ok;
use workplan_resources::pool::{PoolConfig, ResourceManager, ResourcePool};
use workplan_resources::PoolError;

// == Test Manager ==

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable")]
struct Unavailable;

/// A fake connection that flags concurrent use.
#[derive(Debug)]
struct Conn {
    id: usize,
    busy: AtomicBool,
}

#[derive(Default)]
struct FakeBackend {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

#[async_trait::async_trait]
impl ResourceManager for FakeBackend {
    type Resource = Conn;
    type Error = Unavailable;

    async fn create(&self) -> Result<Conn, Unavailable> {
        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Conn {
            id,
            busy: AtomicBool::new(false),
        })
    }

    fn destroy(&self, _conn: Conn) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(min: usize, max: usize, idle: Duration) -> PoolConfig {
    PoolConfig::new()
        .with_min_size(min)
        .with_max_size(max)
        .with_idle_timeout(idle)
        .with_acquire_timeout(Some(Duration::from_secs(5)))
}

async fn pool(min: usize, max: usize, idle: Duration) -> ResourcePool<FakeBackend> {
    ResourcePool::new(FakeBackend::default(), config(min, max, idle))
        .await
        .unwrap()
}

// == Eviction Floor ==

#[tokio::test]
async fn test_release_driven_cleanup_shrinks_to_floor() {
    let pool = pool(2, 5, Duration::from_millis(50)).await;

    let mut held = Vec::new();
    for _ in 0..5 {
        held.push(pool.acquire().await.unwrap());
    }
    assert_eq!(pool.size(), 5);
    assert_eq!(pool.in_use_count(), 5);

    for handle in held {
        pool.release(handle);
    }
    // Nothing has been idle long enough yet
    assert_eq!(pool.size(), 5);

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Pool only shrinks on release traffic
    assert_eq!(pool.size(), 5);

    let handle = pool.acquire().await.unwrap();
    pool.release(handle);

    assert_eq!(pool.size(), 2);
    assert_eq!(pool.manager().closed.load(Ordering::SeqCst), 3);
    assert_eq!(pool.stats().evicted, 3);
}

#[tokio::test]
async fn test_detached_connections_are_replaced_up_to_floor() {
    let pool = pool(2, 4, Duration::from_secs(10)).await;

    let broken = [pool.acquire().await.unwrap(), pool.acquire().await.unwrap()];
    for conn in broken {
        let raw = conn.detach();
        pool.manager().destroy(raw);
    }

    let conn = pool.acquire().await.unwrap();
    pool.release(conn);
    pool.cleanup();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = pool.stats();
    assert!(stats.size >= 2, "pool shrank below min_size: {}", stats.size);
    assert_eq!(stats.in_use, 0);
    assert_eq!(pool.manager().closed.load(Ordering::SeqCst), 2);
}

// == Waiting ==

#[tokio::test]
async fn test_saturated_acquire_waits_for_release() {
    let pool = pool(1, 2, Duration::from_millis(50)).await;

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.in_use_count(), 2);

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished(), "third acquire must wait while saturated");

    let freed_slot = first.slot_id();
    pool.release(first);

    let third = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should be woken by the release")
        .unwrap()
        .unwrap();

    assert_eq!(third.slot_id(), freed_slot);
    assert_eq!(pool.size(), 2);

    drop(second);
    drop(third);
}

#[tokio::test]
async fn test_waiters_are_served_in_arrival_order() {
    let pool = pool(1, 1, Duration::from_secs(10)).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let held = pool.acquire().await.unwrap();

    let mut waiters = Vec::new();
    for name in ["first", "second", "third"] {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        waiters.push(tokio::spawn(async move {
            let conn = pool.acquire().await.unwrap();
            order.lock().await.push(name);
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(conn);
        }));
        // Let each waiter enqueue before the next
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    drop(held);
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*order.lock().await, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_acquire_times_out_when_exhausted() {
    let pool = pool(0, 1, Duration::from_secs(10)).await;
    let _held = pool.acquire().await.unwrap();

    let result = pool.acquire_timeout(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(PoolError::Timeout(_))));
}

#[tokio::test]
async fn test_cancelled_acquire_leaves_no_trace() {
    let pool = pool(0, 1, Duration::from_secs(10)).await;
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    waiter.abort();
    let _ = waiter.await;

    drop(held);

    let again = assert_ok!(pool.try_acquire().await);
    assert_eq!(pool.size(), 1);
    assert_eq!(again.id, 0);
}

// == Mutual Exclusion ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_resource_is_shared_between_callers() {
    let pool = pool(1, 3, Duration::from_millis(5)).await;

    let mut tasks = Vec::new();
    for _ in 0..24 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                let conn = pool.acquire().await.unwrap();
                assert!(
                    !conn.busy.swap(true, Ordering::SeqCst),
                    "connection {} handed to two callers",
                    conn.id
                );
                assert!(pool.size() <= 3);
                tokio::time::sleep(Duration::from_millis(2)).await;
                conn.busy.store(false, Ordering::SeqCst);
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.acquired, 120);
    assert!(stats.size >= 1 && stats.size <= 3);
    assert_eq!(stats.in_use, 0);
}

// == Shutdown ==

#[tokio::test]
async fn test_close_all_wakes_waiters() {
    let pool = pool(1, 1, Duration::from_secs(10)).await;
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.close_all();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(PoolError::Closed)));

    drop(held);
    assert_eq!(pool.manager().closed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.size(), 0);
}

// == Bounds Property ==

#[derive(Debug, Clone)]
enum PoolOp {
    Acquire,
    Release(usize),
    Cleanup,
}

fn pool_op_strategy() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        3 => Just(PoolOp::Acquire),
        3 => (0usize..8).prop_map(PoolOp::Release),
        1 => Just(PoolOp::Cleanup),
    ]
}

const MIN: usize = 1;
const MAX: usize = 4;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Size stays within [MIN, MAX] however acquires and releases interleave.
    #[test]
    fn prop_size_stays_within_bounds(ops in prop::collection::vec(pool_op_strategy(), 1..60)) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        rt.block_on(async {
            let pool = pool(MIN, MAX, Duration::ZERO).await;
            let mut held = Vec::new();

            for op in ops {
                match op {
                    PoolOp::Acquire => match pool.try_acquire().await {
                        Ok(conn) => held.push(conn),
                        Err(err) => {
                            prop_assert!(matches!(err, PoolError::Exhausted));
                            prop_assert_eq!(held.len(), MAX);
                        }
                    },
                    PoolOp::Release(i) => {
                        if !held.is_empty() {
                            let conn = held.swap_remove(i % held.len());
                            pool.release(conn);
                        }
                    }
                    PoolOp::Cleanup => {
                        pool.cleanup();
                    }
                }

                let size = pool.size();
                prop_assert!(size >= MIN && size <= MAX, "size {} out of bounds", size);
                prop_assert_eq!(pool.in_use_count(), held.len());
            }
            Ok(())
        })?;
    }
}
