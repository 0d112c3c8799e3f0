//! Concrete fetcher adapters.
//!
//! The core never talks to a transport itself. These are the reqwest
//! implementations of the [`crate::fetcher::Fetcher`] and
//! [`crate::image::AssetPreloader`] seams, plus builder-style mocks for
//! tests.

pub mod http;
pub mod mock;
pub mod preload;
