//! Resource state machine.
//!
//! A [`Resource`] wraps one asynchronous operation and exposes a
//! synchronous [`Resource::read`] that either returns the resolved value,
//! hands back a [`Settlement`] to await ("suspension"), or re-reports the
//! failure. Status moves `Pending → Fulfilled` or `Pending → Rejected`
//! exactly once and never again; after that every `read` is stable.
//!
//! The wrapped operation is driven by a spawned task holding its own
//! reference, so a resource discarded mid-flight still settles. Results
//! of stale operations are simply dropped with the last reference.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::FetchError;
use crate::metrics::SuspenseMetrics;

/// Process-unique identity of a resource, for logging and identity-based
/// policies such as [`crate::reset::FailureReset`].
pub type ResourceId = u64;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

enum Status<T> {
    Pending,
    Fulfilled(T),
    Rejected(Arc<FetchError>),
}

/// Outcome of a single [`Resource::read`] poll.
#[derive(Debug)]
pub enum ResourceRead<T> {
    /// The operation resolved; the value is stable for the resource's
    /// lifetime.
    Ready(T),
    /// Not settled yet. Await the [`Settlement`], then read again.
    Suspended(Settlement),
    /// The operation failed. The same error is reported on every read.
    Failed(Arc<FetchError>),
}

/// Awaitable settlement signal handed out while a resource is pending.
#[derive(Debug)]
pub struct Settlement {
    rx: watch::Receiver<bool>,
}

impl Settlement {
    /// Resolve once the resource settles. Returns immediately when it
    /// already has, and also when the resource was dropped unsettled;
    /// there is nothing left to wait for in either case.
    pub async fn wait(mut self) {
        if *self.rx.borrow() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if *self.rx.borrow() {
                return;
            }
        }
    }
}

/// Synchronously-pollable handle over one asynchronous operation.
pub struct Resource<T> {
    id: ResourceId,
    state: Mutex<Status<T>>,
    settled: watch::Sender<bool>,
}

impl<T: Clone + Send + 'static> Resource<T> {
    /// Wrap `operation` in a new pending resource and start observing it
    /// in the background. Must be called within a Tokio runtime.
    pub fn new<F>(operation: F) -> Arc<Self>
    where
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        Self::with_metrics(operation, None)
    }

    /// Like [`Resource::new`], additionally recording settle latency and
    /// failures when metrics are wired up.
    pub fn with_metrics<F>(operation: F, metrics: Option<Arc<SuspenseMetrics>>) -> Arc<Self>
    where
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let (settled, _) = watch::channel(false);
        let resource = Arc::new(Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(Status::Pending),
            settled,
        });

        let driver = Arc::clone(&resource);
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = operation.await;
            if let Some(metrics) = &metrics {
                metrics
                    .settle_duration
                    .observe(started.elapsed().as_secs_f64());
                if outcome.is_err() {
                    metrics.fetch_failures_total.inc();
                }
            }
            driver.settle(outcome);
        });

        resource
    }

    /// Poll the resource without blocking.
    pub fn read(&self) -> ResourceRead<T> {
        match &*self.state.lock().expect("resource state poisoned") {
            Status::Fulfilled(value) => ResourceRead::Ready(value.clone()),
            Status::Rejected(error) => ResourceRead::Failed(Arc::clone(error)),
            Status::Pending => ResourceRead::Suspended(Settlement {
                rx: self.settled.subscribe(),
            }),
        }
    }

    /// Settlement signal, regardless of current status.
    pub fn settled(&self) -> Settlement {
        Settlement {
            rx: self.settled.subscribe(),
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(
            *self.state.lock().expect("resource state poisoned"),
            Status::Pending
        )
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(
            *self.state.lock().expect("resource state poisoned"),
            Status::Fulfilled(_)
        )
    }

    pub fn is_rejected(&self) -> bool {
        matches!(
            *self.state.lock().expect("resource state poisoned"),
            Status::Rejected(_)
        )
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    fn settle(&self, outcome: Result<T, FetchError>) {
        let mut state = self.state.lock().expect("resource state poisoned");
        // Terminal states never transition again.
        if !matches!(*state, Status::Pending) {
            return;
        }
        *state = match outcome {
            Ok(value) => Status::Fulfilled(value),
            Err(error) => {
                tracing::debug!("Resource {} rejected: {}", self.id, error);
                Status::Rejected(Arc::new(error))
            }
        };
        drop(state);
        self.settled.send_replace(true);
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self.state.lock() {
            Ok(state) => match &*state {
                Status::Pending => "Pending",
                Status::Fulfilled(_) => "Fulfilled",
                Status::Rejected(_) => "Rejected",
            },
            Err(_) => "<poisoned>",
        };
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("status", &status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    /// A resource whose settlement the test controls through a oneshot.
    fn controlled() -> (oneshot::Sender<Result<u32, FetchError>>, Arc<Resource<u32>>) {
        let (tx, rx) = oneshot::channel();
        let resource = Resource::new(async move {
            rx.await.unwrap_or(Err(FetchError::Unavailable))
        });
        (tx, resource)
    }

    #[tokio::test]
    async fn read_before_settlement_suspends() {
        let (_tx, resource) = controlled();
        assert!(!resource.is_settled());
        assert!(matches!(resource.read(), ResourceRead::Suspended(_)));
    }

    #[tokio::test]
    async fn read_after_fulfillment_returns_value_every_time() {
        let (tx, resource) = controlled();
        tx.send(Ok(7)).unwrap();
        resource.settled().wait().await;

        for _ in 0..3 {
            match resource.read() {
                ResourceRead::Ready(value) => assert_eq!(value, 7),
                other => panic!("expected Ready, got {:?}", other),
            }
        }
        assert!(resource.is_fulfilled());
    }

    #[tokio::test]
    async fn read_after_rejection_reports_the_same_error_every_time() {
        let (tx, resource) = controlled();
        tx.send(Err(FetchError::network("timeout"))).unwrap();
        resource.settled().wait().await;

        let first = match resource.read() {
            ResourceRead::Failed(error) => error,
            other => panic!("expected Failed, got {:?}", other),
        };
        let second = match resource.read() {
            ResourceRead::Failed(error) => error,
            other => panic!("expected Failed, got {:?}", other),
        };

        assert_eq!(first.to_string(), "Network error: timeout");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(resource.is_rejected());
    }

    #[tokio::test]
    async fn suspension_wakes_when_the_operation_settles() {
        let (tx, resource) = controlled();
        let settlement = match resource.read() {
            ResourceRead::Suspended(settlement) => settlement,
            other => panic!("expected Suspended, got {:?}", other),
        };

        tx.send(Ok(42)).unwrap();
        settlement.wait().await;

        assert!(matches!(resource.read(), ResourceRead::Ready(42)));
    }

    #[tokio::test]
    async fn wait_on_an_already_settled_resource_returns_immediately() {
        let (tx, resource) = controlled();
        tx.send(Ok(1)).unwrap();
        resource.settled().wait().await;
        // A second settlement obtained after the fact must not hang.
        resource.settled().wait().await;
    }

    #[tokio::test]
    async fn resources_get_distinct_ids() {
        let (_t1, r1) = controlled();
        let (_t2, r2) = controlled();
        assert_ne!(r1.id(), r2.id());
    }

    #[tokio::test]
    async fn failure_count_lands_in_metrics() {
        let metrics = Arc::new(SuspenseMetrics::new().unwrap());
        let resource = Resource::<u32>::with_metrics(
            async { Err(FetchError::Unavailable) },
            Some(Arc::clone(&metrics)),
        );
        resource.settled().wait().await;
        assert!((metrics.fetch_failures_total.get() - 1.0).abs() < f64::EPSILON);
    }
}
