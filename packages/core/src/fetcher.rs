//! Fetcher interface
//!
//! Abstraction layer over the asynchronous producer a resource wraps.

use async_trait::async_trait;

use crate::error::FetchResult;

/// Trait for asynchronous data sources keyed by name.
///
/// The cache layer passes the fetched payload through untouched: `T` is
/// whatever the consumer wants to read, and a failed fetch is reported
/// verbatim by every subsequent `read()` on the wrapping resource.
#[async_trait]
pub trait Fetcher<T> {
    /// Fetch the value for `name`.
    async fn fetch(&self, name: &str) -> FetchResult<T>;

    /// Name of this fetcher for logging/debugging.
    fn fetcher_name(&self) -> &str;
}
