//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the content cache
///
/// Durations are kept in whole seconds so the struct loads cleanly from TOML and
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum total size of live entries in bytes (default: 256 MiB)
    pub max_cache_size: u64,

    /// Maximum time since last access before an entry expires (default: 24h)
    pub max_cache_age_secs: u64,

    /// Interval between periodic eviction passes (default: 5 min)
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 256 * 1024 * 1024,
            max_cache_age_secs: 24 * 60 * 60,
            cleanup_interval_secs: 5 * 60,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum cache size.
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_cache_size = bytes;
        self
    }

    /// Set maximum entry age.
    pub fn with_max_age(mut self, age: Duration) -> Self {
        self.max_cache_age_secs = age.as_secs();
        self
    }

    /// Set the periodic cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_secs = interval.as_secs();
        self
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_secs(self.max_cache_age_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cache_size == 0 {
            return Err("max_cache_size must be greater than 0".to_string());
        }

        if self.cleanup_interval_secs == 0 {
            return Err("cleanup_interval_secs must be at least 1".to_string());
        }

        Ok(())
    }
}
