//! Background sweep of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use aerodash_cache::CacheStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run `cleanup_expired` every `interval` until `cancel` fires.
///
/// Expired entries are already invisible to readers; the sweep only bounds
/// memory held by keys nobody asks for again.
pub fn spawn_cleanup_task<V>(
    cache: Arc<CacheStore<V>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = cache.cleanup_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "Swept expired cache entries");
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Cache cleanup task shutting down");
                    break;
                }
            }
        }
    })
}
