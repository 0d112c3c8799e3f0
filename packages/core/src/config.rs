use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the suspending resource cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspenseConfig {
    pub cache: CacheConfig,
    pub transition: TransitionConfig,
}

/// TTL and sweep settings for a resource cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a cached resource stays live after insertion.
    pub ttl: Duration,
    /// How often the evictor sweeps expired entries.
    pub sweep_interval: Duration,
}

/// Deferral settings for the transition coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    /// How long a deferred commit may run before the pending flag is raised.
    pub busy_delay: Duration,
    /// Once raised, the pending flag stays up at least this long.
    pub busy_min_duration: Duration,
}

impl Default for SuspenseConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            transition: TransitionConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(5000),
            sweep_interval: Duration::from_millis(1000),
        }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            busy_delay: Duration::from_millis(300),
            busy_min_duration: Duration::from_millis(700),
        }
    }
}

impl SuspenseConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset. Set values must parse as millisecond
    /// counts.
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        Ok(Self {
            cache: CacheConfig {
                ttl: millis_var("SUSPENSE_CACHE_TTL_MS", defaults.cache.ttl)?,
                sweep_interval: millis_var(
                    "SUSPENSE_SWEEP_INTERVAL_MS",
                    defaults.cache.sweep_interval,
                )?,
            },
            transition: TransitionConfig {
                busy_delay: millis_var(
                    "SUSPENSE_BUSY_DELAY_MS",
                    defaults.transition.busy_delay,
                )?,
                busy_min_duration: millis_var(
                    "SUSPENSE_BUSY_MIN_DURATION_MS",
                    defaults.transition.busy_min_duration,
                )?,
            },
        })
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration, String> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| format!("{} must be a valid millisecond count", name)),
        Err(_) => Ok(default),
    }
}
