//! Mock fetchers for tests.
//!
//! Builder-style fakes used by unit and integration tests in place of the
//! HTTP adapters: seed values per name, force an error, add settle delay,
//! and count calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;

use crate::error::{FetchError, FetchResult};
use crate::fetcher::Fetcher;
use crate::image::AssetPreloader;

pub struct MockFetcher<T> {
    values: HashMap<String, T>,
    error: Option<FetchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl<T> MockFetcher<T> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            error: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed the value returned for `name`. Unknown names fetch as
    /// [`FetchError::NotFound`].
    pub fn with_value(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Make every fetch fail with `error`.
    pub fn with_error(mut self, error: FetchError) -> Self {
        self.error = Some(error);
        self
    }

    /// Make every fetch take `delay` before settling.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `fetch` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Default for MockFetcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Fetcher<T> for MockFetcher<T> {
    async fn fetch(&self, name: &str) -> FetchResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            time::sleep(delay).await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::not_found(name))
    }

    fn fetcher_name(&self) -> &str {
        "mock"
    }
}

pub struct MockPreloader {
    error: Option<FetchError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockPreloader {
    pub fn new() -> Self {
        Self {
            error: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_error(mut self, error: FetchError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockPreloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetPreloader for MockPreloader {
    async fn preload(&self, url: &str) -> FetchResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            time::sleep(delay).await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(url.to_string())
    }

    fn preloader_name(&self) -> &str {
        "mock-asset"
    }
}
