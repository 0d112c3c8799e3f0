use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging.
///
/// Safe to call more than once (tests, embedding hosts); only the first
/// call installs a subscriber.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
