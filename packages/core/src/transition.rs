//! Transition coordination for the consumer-facing "current" resource.
//!
//! [`TransitionCoordinator`] decides when a newly requested resource
//! becomes the one a consumer observes. While the previous resource still
//! shows valid content the switch is deferred until the new one settles,
//! and a debounced busy flag tells the consumer to apply a "pending"
//! treatment in the meantime: the flag is only raised when settlement
//! takes longer than `busy_delay`, and once raised the commit is held
//! until the flag has been up for at least `busy_min_duration`.
//!
//! Deferral only ever protects previous *ready* content. A blank,
//! still-loading, or failed current switches over right away, which also
//! guarantees a stale failure display clears as soon as a new key is
//! requested (see [`crate::reset::FailureReset`]).

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::cache::ResourceCache;
use crate::config::TransitionConfig;
use crate::fetcher::Fetcher;
use crate::resource::Resource;

/// Where the coordinator is in the request/commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No key requested (or the request was cleared).
    Idle,
    /// A key was requested; the commit is still deferred.
    Pending,
    /// The requested resource is the current one.
    Committed,
}

struct TransitionState<T> {
    current: Option<Arc<Resource<T>>>,
    phase: Phase,
    /// Bumped on every request; a deferred commit from a superseded
    /// request must never land.
    generation: u64,
}

/// Governs when a requested resource is published as current.
pub struct TransitionCoordinator<T> {
    cache: Arc<ResourceCache<T>>,
    fetcher: Arc<dyn Fetcher<T> + Send + Sync>,
    config: TransitionConfig,
    state: Arc<Mutex<TransitionState<T>>>,
    pending: Arc<watch::Sender<bool>>,
}

impl<T: Clone + Send + 'static> TransitionCoordinator<T> {
    pub fn new(
        cache: Arc<ResourceCache<T>>,
        fetcher: Arc<dyn Fetcher<T> + Send + Sync>,
        config: TransitionConfig,
    ) -> Self {
        let (pending, _) = watch::channel(false);
        Self {
            cache,
            fetcher,
            config,
            state: Arc::new(Mutex::new(TransitionState {
                current: None,
                phase: Phase::Idle,
                generation: 0,
            })),
            pending: Arc::new(pending),
        }
    }

    /// Request that `key` become current.
    ///
    /// An empty key clears the current resource immediately (a cleared
    /// request is never deferred). Otherwise the resource comes from the
    /// cache (deduplicated per key) and is committed either right away or
    /// once it settles, per the deferral policy above.
    pub fn request_key(&self, key: &str) {
        if key.is_empty() {
            let mut state = self.state.lock().expect("transition state poisoned");
            state.generation += 1;
            state.current = None;
            state.phase = Phase::Idle;
            set_pending(&self.pending, false);
            tracing::debug!("Cleared current resource");
            return;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let metrics = self.cache.metrics();
        let resource = self.cache.get(key, move |normalized| {
            let name = normalized.to_string();
            tracing::info!("Requesting '{}' via {}", name, fetcher.fetcher_name());
            Resource::with_metrics(async move { fetcher.fetch(&name).await }, metrics)
        });

        let mut state = self.state.lock().expect("transition state poisoned");
        state.generation += 1;
        let generation = state.generation;

        let keep_previous = state
            .current
            .as_ref()
            .map(|current| current.is_fulfilled())
            .unwrap_or(false);

        if resource.is_settled() || !keep_previous {
            tracing::debug!("Committed resource {} immediately", resource.id());
            state.current = Some(resource);
            state.phase = Phase::Committed;
            set_pending(&self.pending, false);
            return;
        }

        state.phase = Phase::Pending;
        drop(state);

        tokio::spawn(drive_commit(
            resource,
            generation,
            Arc::clone(&self.state),
            Arc::clone(&self.pending),
            self.config.clone(),
        ));
    }

    /// Clear the current resource (the consumer's explicit reset action).
    pub fn reset(&self) {
        self.request_key("");
    }

    /// The resource the consumer should observe, if any.
    pub fn current(&self) -> Option<Arc<Resource<T>>> {
        self.state
            .lock()
            .expect("transition state poisoned")
            .current
            .clone()
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().expect("transition state poisoned").phase
    }

    /// Whether the busy treatment should currently show.
    pub fn is_pending(&self) -> bool {
        *self.pending.borrow()
    }

    /// Watch channel that flips exactly when the busy flag does.
    pub fn pending_changes(&self) -> watch::Receiver<bool> {
        self.pending.subscribe()
    }
}

/// Deferred-commit driver for one request.
async fn drive_commit<T: Clone + Send + 'static>(
    resource: Arc<Resource<T>>,
    generation: u64,
    state: Arc<Mutex<TransitionState<T>>>,
    pending: Arc<watch::Sender<bool>>,
    config: TransitionConfig,
) {
    // Wait out the busy delay. If the resource settles first, commit
    // without ever flashing the busy treatment.
    let settled_early = tokio::select! {
        _ = resource.settled().wait() => true,
        _ = time::sleep(config.busy_delay) => false,
    };

    if !settled_early {
        {
            let state = state.lock().expect("transition state poisoned");
            if state.generation != generation {
                return;
            }
            set_pending(&pending, true);
        }
        let shown_at = Instant::now();
        resource.settled().wait().await;
        let shown_for = shown_at.elapsed();
        if shown_for < config.busy_min_duration {
            time::sleep(config.busy_min_duration - shown_for).await;
        }
    }

    let mut state = state.lock().expect("transition state poisoned");
    if state.generation != generation {
        return;
    }
    tracing::info!("Committed resource {} after deferral", resource.id());
    state.current = Some(resource);
    state.phase = Phase::Committed;
    set_pending(&pending, false);
}

/// Flip the busy flag, notifying watchers only on an actual change.
fn set_pending(pending: &watch::Sender<bool>, value: bool) {
    pending.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
