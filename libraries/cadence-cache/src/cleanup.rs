//! Periodic eviction task

use crate::cache::ContentCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Spawn a task that runs an eviction pass every `cleanup_interval`
///
/// The task stops when `shutdown` is cancelled. Failed deletions are logged and
/// the task keeps running.
pub fn spawn_cleanup(cache: Arc<ContentCache>, shutdown: CancellationToken) -> JoinHandle<()> {
    let period = cache.config().cleanup_interval().max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately
        ticker.tick().await;

        debug!(period_secs = period.as_secs(), "Cache cleanup task started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Cache cleanup task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let report = cache.run_eviction();
                    if !report.is_clean() {
                        warn!(
                            evicted = report.evicted.len(),
                            failures = report.failures.len(),
                            "Periodic eviction finished with failures"
                        );
                    }
                }
            }
        }
    })
}
