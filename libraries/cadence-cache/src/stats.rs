//! Cache statistics

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Read-only snapshot of the cache for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Sum of entry sizes in bytes
    pub total_size: u64,

    /// Number of live entries
    pub count: usize,

    /// Mean time since each entry was last written
    pub average_age: Duration,

    /// Lookups that found an entry
    pub hits: u64,

    /// Lookups that found nothing
    pub misses: u64,

    /// Entries removed by eviction passes
    pub evictions: u64,

    /// Entries currently pinned by playback
    pub pinned: usize,
}

impl CacheStats {
    /// Hit rate in `[0, 1]`; zero before any lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Average entry size in bytes
    pub fn average_entry_size(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_size / self.count as u64
        }
    }
}
