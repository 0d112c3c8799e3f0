// Library root — the suspend/cache/expire core plus the reqwest-backed
// fetcher adapters in `services/`. This crate is an in-process library
// surface only; hosts wire up their own consumer loop and exposure of
// metrics/logging output.

pub mod cache;
pub mod config;
pub mod error;
pub mod evictor;
pub mod fetcher;
pub mod image;
pub mod logging;
pub mod metrics;
pub mod reset;
pub mod resource;
pub mod services;
pub mod transition;
