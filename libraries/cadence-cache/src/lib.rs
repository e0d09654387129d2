//! Bounded content cache for song audio
//!
//! Entries are keyed by [`SongId`](cadence_core::SongId) and charged by
//! [`CachedContent::estimate_size`]. After every insertion, and on a periodic
//! timer, an eviction pass removes entries idle longer than the configured maximum
//! age and then trims least-recently-accessed entries until the total fits the
//! size budget. Entries held by a [`PinGuard`] are never evicted.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_cache::{CacheConfig, CachedContent, ContentCache};
//! use cadence_core::SongId;
//!
//! # fn example() -> cadence_cache::Result<()> {
//! let cache = ContentCache::new(CacheConfig::new().with_max_size(64 * 1024 * 1024));
//! let id = SongId::new("song-1");
//!
//! cache.put(id.clone(), &CachedContent::audio(vec![0u8; 1024]))?;
//! let _pin = cache.pin(&id);
//! assert!(cache.get(&id).is_some());
//! # Ok(())
//! # }
//! ```

mod cache;
mod cleanup;
mod config;
mod content;
mod error;
mod stats;
mod store;

pub use cache::{ContentCache, EvictionReport, PinGuard};
pub use cleanup::spawn_cleanup;
pub use config::CacheConfig;
pub use content::CachedContent;
pub use error::{CacheFault, Result};
pub use stats::CacheStats;
pub use store::{CacheStore, DiskStore, MemoryStore};
