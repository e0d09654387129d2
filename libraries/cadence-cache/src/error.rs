//! Error types for the content cache

use cadence_core::SongId;
use thiserror::Error;

/// Cache faults reported to callers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheFault {
    /// A single item is larger than the whole cache budget
    #[error("Content for {key} is {size} bytes, cache limit is {max} bytes")]
    TooLarge { key: SongId, size: u64, max: u64 },

    /// The entry size could not be computed
    #[error("Could not estimate size of {key}: {message}")]
    SizeEstimation { key: SongId, message: String },

    /// The backing store failed to read, write or delete
    #[error("Backing store failure for {key}: {message}")]
    BackingStoreFailure { key: SongId, message: String },

    /// An eviction pass completed but some entries could not be deleted
    #[error("Eviction finished with {} failed deletions", failures.len())]
    Eviction { failures: Vec<CacheFault> },
}

impl CacheFault {
    pub(crate) fn store(key: &SongId, err: &std::io::Error) -> Self {
        Self::BackingStoreFailure {
            key: key.clone(),
            message: err.to_string(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheFault>;
