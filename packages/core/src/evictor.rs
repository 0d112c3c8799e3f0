//! Cache eviction scheduler.
//!
//! Drives the background sweep loop: each tick removes expired entries
//! from the owning [`ResourceCache`], independent of reads and writes.
//! Eviction only detaches entries from future lookups; a consumer still
//! holding an evicted resource keeps observing it to completion.
//!
//! The loop is cancelable: [`Evictor::stop`] winds it down, and dropping
//! the handle aborts the task, so a discarded cache never leaves a timer
//! running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::cache::ResourceCache;

/// Run the eviction sweep loop.
///
/// On each tick every entry past its deadline is removed via
/// [`ResourceCache::sweep`]. Runs until a value arrives on `shutdown`
/// (or its sender side is dropped).
pub async fn run_eviction<T>(
    cache: Arc<ResourceCache<T>>,
    sweep_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    T: Clone + Send + 'static,
{
    let mut interval = time::interval(sweep_interval);

    tracing::info!(
        "Eviction sweep started (interval: {}ms)",
        sweep_interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(
                        "Evicted {} expired entries ({} live)",
                        removed,
                        cache.len()
                    );
                }
            }

            _ = shutdown.changed() => {
                break;
            }
        }
    }

    tracing::info!("Eviction sweep stopped cleanly");
}

/// Handle for a spawned eviction loop.
pub struct Evictor {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Evictor {
    /// Spawn the sweep loop for `cache` on the current runtime.
    pub fn spawn<T>(cache: Arc<ResourceCache<T>>, sweep_interval: Duration) -> Self
    where
        T: Clone + Send + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_eviction(cache, sweep_interval, shutdown_rx));
        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Stop the loop and wait for it to wind down. After this returns no
    /// further sweeps run.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Evictor {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
