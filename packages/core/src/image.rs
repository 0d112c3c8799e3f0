//! Image resource cache.
//!
//! Specialization of [`ResourceCache`] for asset preloading: keyed by URL
//! (verbatim, since URLs are case-sensitive), each resource resolves with the
//! asset locator once the preloader confirms the asset is loaded. A
//! rendering consumer reads the resource before emitting the reference,
//! so suspension covers data and asset readiness uniformly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{KeyNormalization, ResourceCache};
use crate::error::FetchResult;
use crate::metrics::SuspenseMetrics;
use crate::resource::Resource;

/// Trait for asset preloaders: resolve with the locator once the asset
/// behind it is confirmed loaded.
#[async_trait]
pub trait AssetPreloader {
    async fn preload(&self, url: &str) -> FetchResult<String>;

    /// Name of this preloader for logging/debugging.
    fn preloader_name(&self) -> &str;
}

/// TTL cache of preloaded asset resources, keyed by URL.
pub struct ImageResourceCache {
    cache: Arc<ResourceCache<String>>,
    preloader: Arc<dyn AssetPreloader + Send + Sync>,
}

impl ImageResourceCache {
    pub fn new(preloader: Arc<dyn AssetPreloader + Send + Sync>, ttl: Duration) -> Self {
        Self {
            cache: Arc::new(ResourceCache::new(ttl, KeyNormalization::Verbatim)),
            preloader,
        }
    }

    pub fn with_metrics(
        preloader: Arc<dyn AssetPreloader + Send + Sync>,
        ttl: Duration,
        metrics: Arc<SuspenseMetrics>,
    ) -> Self {
        Self {
            cache: Arc::new(ResourceCache::with_metrics(
                ttl,
                KeyNormalization::Verbatim,
                metrics,
            )),
            preloader,
        }
    }

    /// Resource resolving with `url` once the asset behind it is loaded.
    /// Deduplicated per URL like any other cache lookup.
    pub fn get(&self, url: &str) -> Arc<Resource<String>> {
        let preloader = Arc::clone(&self.preloader);
        let metrics = self.cache.metrics();
        self.cache.get(url, move |normalized| {
            let url = normalized.to_string();
            tracing::debug!("Preloading '{}' via {}", url, preloader.preloader_name());
            Resource::with_metrics(async move { preloader.preload(&url).await }, metrics)
        })
    }

    /// The underlying cache, for wiring up an eviction sweep.
    pub fn cache(&self) -> &Arc<ResourceCache<String>> {
        &self.cache
    }
}
