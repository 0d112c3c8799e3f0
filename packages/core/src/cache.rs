//! Keyed TTL cache of resources.
//!
//! [`ResourceCache`] maps a normalized key to one live [`Resource`]:
//! `get` returns the existing resource on a hit and calls the factory on a
//! miss, so at most one fetch is in flight per key at a time. Every entry
//! carries a deadline fixed at insertion (`now + ttl`); hits never extend
//! it. An entry past its deadline is logically absent even before the
//! eviction sweep runs; `get` treats it as a miss and replaces it.
//!
//! The entries map is the only shared mutable state. One mutex guards it,
//! and the lock is held across the check-and-insert in `get`, so
//! concurrent lookups for the same key converge on a single resource.
//! The eviction sweep uses the same lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::metrics::SuspenseMetrics;
use crate::resource::Resource;

/// How lookup keys are folded before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyNormalization {
    /// Case-insensitive keys (data lookups by name).
    CaseFold,
    /// Keys used exactly as given (URLs are case-sensitive).
    Verbatim,
}

struct CacheEntry<T> {
    resource: Arc<Resource<T>>,
    expires_at: Instant,
}

/// TTL cache mapping normalized keys to shared resources.
pub struct ResourceCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
    normalization: KeyNormalization,
    metrics: Option<Arc<SuspenseMetrics>>,
}

impl<T: Clone + Send + 'static> ResourceCache<T> {
    pub fn new(ttl: Duration, normalization: KeyNormalization) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            normalization,
            metrics: None,
        }
    }

    /// Same cache, with hit/miss/eviction counters wired up.
    pub fn with_metrics(
        ttl: Duration,
        normalization: KeyNormalization,
        metrics: Arc<SuspenseMetrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(ttl, normalization)
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn metrics(&self) -> Option<Arc<SuspenseMetrics>> {
        self.metrics.clone()
    }

    fn normalize(&self, key: &str) -> String {
        match self.normalization {
            KeyNormalization::CaseFold => key.to_lowercase(),
            KeyNormalization::Verbatim => key.to_string(),
        }
    }

    /// Return the live resource for `key`, creating one via `factory` on a
    /// miss. The factory receives the normalized key. No per-entry timer is
    /// scheduled here; expiry is enforced lazily and by the sweep.
    ///
    /// A hit on an entry whose fetch already failed is treated as a miss:
    /// re-requesting a failed key is the consumer's retry path and must not
    /// wait out the TTL.
    pub fn get<F>(&self, key: &str, factory: F) -> Arc<Resource<T>>
    where
        F: FnOnce(&str) -> Arc<Resource<T>>,
    {
        let normalized = self.normalize(key);
        let mut entries = self.entries.lock().expect("cache entries poisoned");
        let now = Instant::now();

        if let Some(entry) = entries.get(&normalized) {
            if entry.expires_at >= now && !entry.resource.is_rejected() {
                if let Some(metrics) = &self.metrics {
                    metrics.cache_hits_total.inc();
                }
                tracing::debug!("Cache hit for '{}'", normalized);
                return Arc::clone(&entry.resource);
            }
            entries.remove(&normalized);
        }

        if let Some(metrics) = &self.metrics {
            metrics.cache_misses_total.inc();
        }
        let resource = factory(&normalized);
        tracing::debug!(
            "Cache miss for '{}', created resource {}",
            normalized,
            resource.id()
        );
        entries.insert(
            normalized,
            CacheEntry {
                resource: Arc::clone(&resource),
                expires_at: now + self.ttl,
            },
        );
        if let Some(metrics) = &self.metrics {
            metrics.entries_live.set(entries.len() as f64);
        }
        resource
    }

    /// Remove every entry past its deadline and return how many were
    /// dropped. Removal only detaches entries from future lookups; it
    /// never cancels the in-flight operation, and consumers holding the
    /// resource keep observing it to completion.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().expect("cache entries poisoned");
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        let removed = before - entries.len();
        if removed > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.evictions_total.inc_by(removed as f64);
                metrics.entries_live.set(entries.len() as f64);
            }
        }
        removed
    }

    /// Drop all entries regardless of expiry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().expect("cache entries poisoned");
        entries.clear();
        if let Some(metrics) = &self.metrics {
            metrics.entries_live.set(0.0);
        }
    }

    /// Number of entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache entries poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use crate::error::FetchError;

    fn ready(value: u32) -> Arc<Resource<u32>> {
        Resource::new(async move { Ok(value) })
    }

    fn failing() -> Arc<Resource<u32>> {
        Resource::new(async { Err(FetchError::network("boom")) })
    }

    #[tokio::test]
    async fn distinct_keys_get_distinct_resources() {
        let cache = ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
        let a = cache.get("bulbasaur", |_| ready(1));
        let b = cache.get("charmander", |_| ready(2));
        assert_ne!(a.id(), b.id());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn repeated_gets_within_ttl_reuse_the_resource_and_factory_runs_once() {
        let cache = ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
        let calls = AtomicUsize::new(0);

        let first = cache.get("Pikachu", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(1)
        });
        let second = cache.get("pikachu", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(2)
        });

        assert_eq!(first.id(), second.id());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn factory_receives_the_normalized_key() {
        let cache = ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
        cache.get("MewTwo", |normalized| {
            assert_eq!(normalized, "mewtwo");
            ready(0)
        });
    }

    #[tokio::test]
    async fn verbatim_keys_are_case_sensitive() {
        let cache = ResourceCache::new(Duration::from_secs(5), KeyNormalization::Verbatim);
        let a = cache.get("https://img/A.png", |_| ready(1));
        let b = cache.get("https://img/a.png", |_| ready(2));
        assert_ne!(a.id(), b.id());
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn an_expired_entry_is_replaced_on_get() {
        let cache = ResourceCache::new(Duration::from_millis(5000), KeyNormalization::CaseFold);
        let first = cache.get("pikachu", |_| ready(1));

        tokio::time::sleep(Duration::from_millis(5200)).await;

        let second = cache.get("pikachu", |_| ready(2));
        assert_ne!(first.id(), second.id());
        // The evicted resource keeps reporting its settled value to anyone
        // still holding it.
        first.settled().wait().await;
        assert!(first.is_fulfilled());
    }

    #[tokio::test]
    async fn a_rejected_entry_is_replaced_on_get() {
        let cache = ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
        let first = cache.get("missingno", |_| failing());
        first.settled().wait().await;
        assert!(first.is_rejected());

        let calls = AtomicUsize::new(0);
        let second = cache.get("missingno", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            ready(3)
        });
        assert_ne!(first.id(), second.id());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired_entries() {
        let cache = ResourceCache::new(Duration::from_millis(5000), KeyNormalization::CaseFold);
        cache.get("old", |_| ready(1));
        tokio::time::sleep(Duration::from_millis(3000)).await;
        cache.get("new", |_| ready(2));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
        cache.get("a", |_| ready(1));
        cache.get("b", |_| ready(2));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_gets_for_one_key_converge_on_one_resource() {
        let cache = Arc::new(ResourceCache::new(
            Duration::from_secs(5),
            KeyNormalization::CaseFold,
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get("eevee", |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ready(9)
                    })
                    .id()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn metrics_record_hits_misses_and_evictions() {
        let metrics = Arc::new(SuspenseMetrics::new().unwrap());
        let cache = ResourceCache::with_metrics(
            Duration::from_secs(5),
            KeyNormalization::CaseFold,
            Arc::clone(&metrics),
        );
        cache.get("squirtle", |_| ready(1));
        cache.get("squirtle", |_| ready(2));
        assert!((metrics.cache_misses_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.cache_hits_total.get() - 1.0).abs() < f64::EPSILON);
        assert!((metrics.entries_live.get() - 1.0).abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn case_folded_keys_converge_on_one_resource(key in "[a-zA-Z]{1,12}") {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (first, second) = rt.block_on(async {
                let cache =
                    ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
                let a = cache.get(&key, |_| ready(1));
                let b = cache.get(&key.to_uppercase(), |_| ready(2));
                (a.id(), b.id())
            });
            prop_assert_eq!(first, second);
        }

        #[test]
        fn at_most_one_entry_per_folded_key(
            keys in prop::collection::vec("[a-zA-Z]{1,6}", 1..20)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let folded = keys
                .iter()
                .map(|k| k.to_lowercase())
                .collect::<std::collections::HashSet<_>>();
            let len = rt.block_on(async {
                let cache =
                    ResourceCache::new(Duration::from_secs(5), KeyNormalization::CaseFold);
                for key in &keys {
                    cache.get(key, |_| ready(0));
                }
                cache.len()
            });
            prop_assert_eq!(len, folded.len());
        }
    }
}
