//! Prometheus metrics registry for the suspending resource cache.
//!
//! [`SuspenseMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once in the owning scope, wrap in `Arc`, and hand
//! it to each cache via [`crate::cache::ResourceCache::with_metrics`]. The
//! host process decides how to expose [`SuspenseMetrics::render`] output;
//! this crate has no endpoint of its own.

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};

/// All metrics emitted by the resource cache layer.
pub struct SuspenseMetrics {
    /// Total `get` calls answered from a live cache entry.
    pub cache_hits_total: Counter,
    /// Total `get` calls that created a new resource.
    pub cache_misses_total: Counter,
    /// Total entries removed by eviction sweeps.
    pub evictions_total: Counter,
    /// Total wrapped operations that settled with an error.
    pub fetch_failures_total: Counter,
    /// Current number of live cache entries.
    pub entries_live: Gauge,
    /// Wrapped-operation settle latency in seconds.
    pub settle_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl SuspenseMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated (should not happen in practice).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cache_hits_total = Counter::with_opts(Opts::new(
            "suspense_cache_hits_total",
            "Cache lookups answered from a live entry",
        ))?;

        let cache_misses_total = Counter::with_opts(Opts::new(
            "suspense_cache_misses_total",
            "Cache lookups that created a new resource",
        ))?;

        let evictions_total = Counter::with_opts(Opts::new(
            "suspense_cache_evictions_total",
            "Entries removed by eviction sweeps",
        ))?;

        let fetch_failures_total = Counter::with_opts(Opts::new(
            "suspense_cache_fetch_failures_total",
            "Wrapped operations that settled with an error",
        ))?;

        let entries_live = Gauge::with_opts(Opts::new(
            "suspense_cache_entries_live",
            "Current number of live cache entries",
        ))?;

        let settle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "suspense_cache_settle_duration_seconds",
                "Wrapped-operation settle latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(evictions_total.clone()))?;
        registry.register(Box::new(fetch_failures_total.clone()))?;
        registry.register(Box::new(entries_live.clone()))?;
        registry.register(Box::new(settle_duration.clone()))?;

        Ok(Self {
            cache_hits_total,
            cache_misses_total,
            evictions_total,
            fetch_failures_total,
            entries_live,
            settle_duration,
            registry,
        })
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
