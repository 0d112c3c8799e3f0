//! Error types for resource fetching

use thiserror::Error;

/// Errors produced by the asynchronous operation a resource wraps.
///
/// The cache layer never translates these: whatever the fetcher failed
/// with is what every subsequent `read()` reports.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Data format error: {message}")]
    Format { message: String },

    #[error("Asset error: {message}")]
    Asset { message: String },

    #[error("No value found for '{name}'")]
    NotFound { name: String },

    #[error("Service unavailable")]
    Unavailable,
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format { message: message.into() }
    }

    pub fn asset(message: impl Into<String>) -> Self {
        Self::Asset { message: message.into() }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;
