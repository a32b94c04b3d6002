//! Pool Reaper Task
//!
//! Background task that periodically closes idle pooled resources.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pool::{ResourceManager, ResourcePool};

/// Spawns a task that calls [`ResourcePool::cleanup`] and
/// [`ResourcePool::replenish`] every `interval`.
///
/// Without it, idle resources above the floor are only reclaimed when some
/// other resource is released. The task stops by itself once the pool is
/// closed; the returned handle can also be aborted during shutdown.
///
/// # Example
/// ```ignore
/// let reaper = spawn_reaper_task(pool.clone(), Duration::from_secs(10));
/// // Later, during shutdown:
/// reaper.abort();
/// ```
pub fn spawn_reaper_task<M: ResourceManager>(
    pool: ResourcePool<M>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting pool reaper with interval of {:?}, floor of {}",
            interval,
            pool.config().min_size
        );

        loop {
            tokio::time::sleep(interval).await;

            if pool.is_closed() {
                info!("Pool closed, stopping reaper");
                break;
            }

            let evicted = pool.cleanup();
            if evicted > 0 {
                info!("Pool reaper: closed {} idle resources", evicted);
            } else {
                debug!("Pool reaper: nothing to close");
            }

            match pool.replenish().await {
                Ok(0) => {}
                Ok(opened) => info!("Pool reaper: reopened {} resources", opened),
                Err(err) => warn!("Pool reaper could not restore min_size: {}", err),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use std::convert::Infallible;

    struct Numbers;

    #[async_trait::async_trait]
    impl ResourceManager for Numbers {
        type Resource = u32;
        type Error = Infallible;

        async fn create(&self) -> Result<u32, Infallible> {
            Ok(7)
        }
    }

    async fn pool(min: usize, max: usize) -> ResourcePool<Numbers> {
        let config = PoolConfig::new()
            .with_min_size(min)
            .with_max_size(max)
            .with_idle_timeout(Duration::from_millis(20));
        ResourcePool::new(Numbers, config).await.unwrap()
    }

    #[tokio::test]
    async fn test_reaper_closes_idle_resources() {
        let pool = pool(1, 3).await;
        let held = vec![
            pool.acquire().await.unwrap(),
            pool.acquire().await.unwrap(),
            pool.acquire().await.unwrap(),
        ];
        drop(held);
        assert_eq!(pool.size(), 3);

        let handle = spawn_reaper_task(pool.clone(), Duration::from_millis(30));

        // No release traffic after this point; only the reaper can shrink the pool
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.size(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_reaper_stops_after_close() {
        let pool = pool(1, 2).await;
        let handle = spawn_reaper_task(pool.clone(), Duration::from_millis(10));

        pool.close_all();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(handle.is_finished(), "Reaper should exit once the pool is closed");
    }

    #[tokio::test]
    async fn test_reaper_can_be_aborted() {
        let pool = pool(0, 1).await;
        let handle = spawn_reaper_task(pool, Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
