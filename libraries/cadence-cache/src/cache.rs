//! Content cache with LRU-with-TTL eviction
//!
//! The index (sizes, timestamps, pins, counters) sits behind one mutex. Lookups and
//! eviction scans both take it, so a `get` can never observe an entry the eviction
//! pass has already decided to drop. Store I/O for deletions happens after the lock
//! is released and is keyed by generation, so a late delete never touches content
//! written by a newer `put`.

use crate::config::CacheConfig;
use crate::content::CachedContent;
use crate::error::{CacheFault, Result};
use crate::stats::CacheStats;
use crate::store::{CacheStore, MemoryStore};
use cadence_core::SongId;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Entry {
    size: u64,
    /// Insertion sequence; an overwrite gets a fresh one
    generation: u64,
    last_accessed: Instant,
    last_modified: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvictReason {
    Expired,
    OverBudget,
}

#[derive(Debug)]
struct Victim {
    key: SongId,
    generation: u64,
    reason: EvictReason,
}

#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<SongId, Entry>,
    /// Pin counts, kept apart from entries so a pin outlives an overwrite
    pins: HashMap<SongId, usize>,
    next_generation: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheIndex {
    fn allocate_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn is_pinned(&self, key: &SongId) -> bool {
        self.pins.get(key).is_some_and(|count| *count > 0)
    }

    fn total_size(&self) -> u64 {
        self.entries.values().map(|entry| entry.size).sum()
    }

    /// Decide which entries leave the cache at `now`
    ///
    /// Pinned entries never leave and their sizes are reserved first. Unexpired
    /// unpinned entries are walked most-recently-accessed first (earlier insertion
    /// first on ties); the first one that would push the running total past the
    /// budget, and every one after it, is a victim.
    fn plan_eviction(&self, now: Instant, config: &CacheConfig) -> Vec<Victim> {
        let max_age = config.max_cache_age();
        let mut victims = Vec::new();
        let mut reserved = 0u64;
        let mut live: Vec<(&SongId, &Entry)> = Vec::new();

        for (key, entry) in &self.entries {
            if self.is_pinned(key) {
                reserved = reserved.saturating_add(entry.size);
            } else if now.saturating_duration_since(entry.last_accessed) > max_age {
                victims.push(Victim {
                    key: key.clone(),
                    generation: entry.generation,
                    reason: EvictReason::Expired,
                });
            } else {
                live.push((key, entry));
            }
        }

        live.sort_by_key(|(_, entry)| (Reverse(entry.last_accessed), entry.generation));

        let mut running = reserved;
        let mut over_budget = false;
        for (key, entry) in live {
            if !over_budget && running.saturating_add(entry.size) > config.max_cache_size {
                over_budget = true;
            }
            if over_budget {
                victims.push(Victim {
                    key: key.clone(),
                    generation: entry.generation,
                    reason: EvictReason::OverBudget,
                });
            } else {
                running += entry.size;
            }
        }

        victims
    }
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Songs removed from the cache index
    pub evicted: Vec<SongId>,
    /// How many of those had outlived the maximum age
    pub expired: usize,
    /// How many of those were dropped to fit the size budget
    pub over_budget: usize,
    /// Store deletions that failed; the entries are gone from the index regardless
    pub failures: Vec<CacheFault>,
}

impl EvictionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into an aggregate error if any deletion failed
    pub fn into_result(self) -> Result<Vec<SongId>> {
        if self.failures.is_empty() {
            Ok(self.evicted)
        } else {
            Err(CacheFault::Eviction {
                failures: self.failures,
            })
        }
    }
}

/// Keeps an entry out of eviction while held
///
/// Dropping the guard releases the pin. An explicit `remove` or `clear` still
/// removes a pinned entry.
#[derive(Debug)]
pub struct PinGuard {
    index: Arc<Mutex<CacheIndex>>,
    key: SongId,
}

impl PinGuard {
    pub fn key(&self) -> &SongId {
        &self.key
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        let mut index = self.index.lock();
        if let Some(count) = index.pins.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                index.pins.remove(&self.key);
            }
        }
    }
}

/// Bounded content cache keyed by song id
#[derive(Debug)]
pub struct ContentCache {
    config: CacheConfig,
    index: Arc<Mutex<CacheIndex>>,
    store: Arc<dyn CacheStore>,
}

impl ContentCache {
    /// Cache backed by memory
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Cache backed by a custom store
    pub fn with_store(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            index: Arc::new(Mutex::new(CacheIndex::default())),
            store,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether `get` and `put` block on file I/O
    pub fn blocks_on_io(&self) -> bool {
        self.store.blocks_on_io()
    }

    /// Look up content and refresh its access time
    ///
    /// A miss, including content the store can no longer produce, returns `None`.
    pub fn get(&self, key: &SongId) -> Option<CachedContent> {
        let generation = {
            let mut guard = self.index.lock();
            let index = &mut *guard;
            if let Some(entry) = index.entries.get_mut(key) {
                entry.last_accessed = Instant::now();
                index.hits += 1;
                entry.generation
            } else {
                index.misses += 1;
                return None;
            }
        };

        match self.store.read(key, generation) {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                debug!(song_id = %key, generation, "Cached content missing from store");
                self.forget(key, generation);
                None
            }
            Err(err) => {
                warn!(song_id = %key, generation, error = %err, "Failed to read cached content");
                self.forget(key, generation);
                None
            }
        }
    }

    /// Insert or replace content, then run an eviction pass
    ///
    /// Replacing an entry counts as a fresh insertion. The returned report lists
    /// what the eviction pass removed and any store deletions that failed.
    pub fn put(&self, key: SongId, content: &CachedContent) -> Result<EvictionReport> {
        let size = content
            .estimate_size()
            .map_err(|err| CacheFault::SizeEstimation {
                key: key.clone(),
                message: err.to_string(),
            })?;

        if size > self.config.max_cache_size {
            return Err(CacheFault::TooLarge {
                key,
                size,
                max: self.config.max_cache_size,
            });
        }

        let generation = self.index.lock().allocate_generation();
        self.store
            .write(&key, generation, content)
            .map_err(|err| CacheFault::store(&key, &err))?;

        let stale = {
            let mut index = self.index.lock();
            let newer_exists = index
                .entries
                .get(&key)
                .is_some_and(|entry| entry.generation > generation);
            if newer_exists {
                // A concurrent put of the same song finished first
                Some(generation)
            } else {
                let now = Instant::now();
                index
                    .entries
                    .insert(
                        key.clone(),
                        Entry {
                            size,
                            generation,
                            last_accessed: now,
                            last_modified: now,
                        },
                    )
                    .map(|previous| previous.generation)
            }
        };

        if let Some(stale) = stale {
            if let Err(err) = self.store.delete(&key, stale) {
                warn!(song_id = %key, generation = stale, error = %err, "Failed to delete replaced content");
            }
        }

        debug!(song_id = %key, size, generation, "Cached content");
        Ok(self.run_eviction())
    }

    /// Remove an entry, pinned or not
    ///
    /// Returns whether the entry existed.
    pub fn remove(&self, key: &SongId) -> Result<bool> {
        let removed = self.index.lock().entries.remove(key);
        let Some(entry) = removed else {
            return Ok(false);
        };

        self.store
            .delete(key, entry.generation)
            .map_err(|err| CacheFault::store(key, &err))?;
        debug!(song_id = %key, "Removed cached content");
        Ok(true)
    }

    /// Drop every entry, pinned or not
    ///
    /// Outstanding pins stay counted so they still protect a later `put` of the
    /// same song until their guards drop.
    pub fn clear(&self) -> Result<()> {
        let count = {
            let mut index = self.index.lock();
            let count = index.entries.len();
            index.entries.clear();
            count
        };

        self.store.clear().map_err(|err| CacheFault::BackingStoreFailure {
            key: SongId::new("*"),
            message: err.to_string(),
        })?;
        info!(count, "Cleared content cache");
        Ok(())
    }

    /// Protect an entry from eviction while the guard lives
    ///
    /// Returns `None` if the song is not cached.
    pub fn pin(&self, key: &SongId) -> Option<PinGuard> {
        let mut index = self.index.lock();
        if !index.entries.contains_key(key) {
            return None;
        }
        *index.pins.entry(key.clone()).or_insert(0) += 1;
        Some(PinGuard {
            index: Arc::clone(&self.index),
            key: key.clone(),
        })
    }

    pub fn is_pinned(&self, key: &SongId) -> bool {
        self.index.lock().is_pinned(key)
    }

    pub fn contains(&self, key: &SongId) -> bool {
        self.index.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().entries.is_empty()
    }

    /// Sum of the charged sizes of all entries
    pub fn total_size(&self) -> u64 {
        self.index.lock().total_size()
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> CacheStats {
        let index = self.index.lock();
        let now = Instant::now();
        let count = index.entries.len();

        let average_age = if count == 0 {
            Duration::ZERO
        } else {
            let total: Duration = index
                .entries
                .values()
                .map(|entry| now.saturating_duration_since(entry.last_modified))
                .sum();
            total / u32::try_from(count).unwrap_or(u32::MAX)
        };

        CacheStats {
            total_size: index.total_size(),
            count,
            average_age,
            hits: index.hits,
            misses: index.misses,
            evictions: index.evictions,
            pinned: index
                .entries
                .keys()
                .filter(|key| index.is_pinned(key))
                .count(),
        }
    }

    /// Run one eviction pass now
    ///
    /// Victims leave the index before any store deletion happens. Deletions that
    /// fail are collected in the report instead of stopping the pass.
    pub fn run_eviction(&self) -> EvictionReport {
        let victims = {
            let mut index = self.index.lock();
            let victims = index.plan_eviction(Instant::now(), &self.config);
            for victim in &victims {
                index.entries.remove(&victim.key);
            }
            index.evictions += victims.len() as u64;
            victims
        };

        let mut report = EvictionReport::default();
        for victim in victims {
            if let Err(err) = self.store.delete(&victim.key, victim.generation) {
                warn!(song_id = %victim.key, error = %err, "Failed to delete evicted content");
                report.failures.push(CacheFault::store(&victim.key, &err));
            }
            match victim.reason {
                EvictReason::Expired => report.expired += 1,
                EvictReason::OverBudget => report.over_budget += 1,
            }
            report.evicted.push(victim.key);
        }

        if !report.evicted.is_empty() {
            debug!(
                evicted = report.evicted.len(),
                expired = report.expired,
                over_budget = report.over_budget,
                failures = report.failures.len(),
                "Eviction pass finished"
            );
        }

        report
    }

    /// Drop an index entry whose content the store could not produce
    fn forget(&self, key: &SongId, generation: u64) {
        let mut index = self.index.lock();
        if index
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            index.entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: u64) -> CacheConfig {
        CacheConfig::new()
            .with_max_size(max)
            .with_max_age(Duration::from_secs(3600))
    }

    fn bytes(n: usize) -> CachedContent {
        CachedContent::audio(vec![0u8; n])
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_and_get() {
        let cache = ContentCache::new(config(1000));
        let key = SongId::new("a");

        cache.put(key.clone(), &bytes(10)).unwrap();

        assert_eq!(cache.get(&key).unwrap().audio.len(), 10);
        assert!(cache.get(&SongId::new("missing")).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_size, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_large_is_rejected() {
        let cache = ContentCache::new(config(100));

        let err = cache.put(SongId::new("big"), &bytes(101)).unwrap_err();

        assert!(matches!(err, CacheFault::TooLarge { size: 101, max: 100, .. }));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_least_recently_accessed_is_evicted() {
        let cache = ContentCache::new(config(30));

        cache.put(SongId::new("a"), &bytes(10)).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(SongId::new("b"), &bytes(10)).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(SongId::new("c"), &bytes(10)).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;

        // Touch "a" so "b" becomes the oldest access
        cache.get(&SongId::new("a"));
        tokio::time::advance(Duration::from_secs(1)).await;

        let report = cache.put(SongId::new("d"), &bytes(10)).unwrap();

        assert_eq!(report.evicted, vec![SongId::new("b")]);
        assert_eq!(report.over_budget, 1);
        assert!(cache.contains(&SongId::new("a")));
        assert!(!cache.contains(&SongId::new("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_access_times_evict_later_insertion() {
        let cache = ContentCache::new(config(20));

        // Paused clock: all three share one access time
        cache.put(SongId::new("first"), &bytes(10)).unwrap();
        cache.put(SongId::new("second"), &bytes(10)).unwrap();
        let report = cache.put(SongId::new("third"), &bytes(10)).unwrap();

        assert_eq!(report.evicted, vec![SongId::new("third")]);
        assert!(cache.contains(&SongId::new("first")));
        assert!(cache.contains(&SongId::new("second")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_evicted() {
        let cache = ContentCache::new(config(1000));

        cache.put(SongId::new("old"), &bytes(10)).unwrap();
        tokio::time::advance(Duration::from_secs(3601)).await;
        let report = cache.put(SongId::new("new"), &bytes(10)).unwrap();

        assert_eq!(report.evicted, vec![SongId::new("old")]);
        assert_eq!(report.expired, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pinned_entry_survives_eviction() {
        let cache = ContentCache::new(config(20));

        cache.put(SongId::new("pinned"), &bytes(10)).unwrap();
        let guard = cache.pin(&SongId::new("pinned")).unwrap();
        tokio::time::advance(Duration::from_secs(7200)).await;

        cache.put(SongId::new("b"), &bytes(10)).unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        let report = cache.put(SongId::new("c"), &bytes(10)).unwrap();

        assert!(cache.contains(&SongId::new("pinned")));
        assert_eq!(report.evicted, vec![SongId::new("b")]);
        assert!(cache.is_pinned(&SongId::new("pinned")));

        drop(guard);
        assert!(!cache.is_pinned(&SongId::new("pinned")));

        let report = cache.run_eviction();
        assert_eq!(report.evicted, vec![SongId::new("pinned")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pin_missing_entry_returns_none() {
        let cache = ContentCache::new(config(100));
        assert!(cache.pin(&SongId::new("nope")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_ignores_pin() {
        let cache = ContentCache::new(config(100));
        let key = SongId::new("a");

        cache.put(key.clone(), &bytes(10)).unwrap();
        let _guard = cache.pin(&key).unwrap();

        assert!(cache.remove(&key).unwrap());
        assert!(!cache.contains(&key));
        assert!(!cache.remove(&key).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_is_fresh_insertion() {
        let cache = ContentCache::new(config(100));
        let key = SongId::new("a");

        cache.put(key.clone(), &bytes(10)).unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        cache.put(key.clone(), &bytes(20)).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total_size, 20);
        assert_eq!(stats.average_age, Duration::ZERO);
        assert_eq!(cache.get(&key).unwrap().audio.len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_average_age() {
        let cache = ContentCache::new(config(100));

        cache.put(SongId::new("a"), &bytes(1)).unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        cache.put(SongId::new("b"), &bytes(1)).unwrap();

        assert_eq!(cache.stats().average_age, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let cache = ContentCache::new(config(100));
        cache.put(SongId::new("a"), &bytes(1)).unwrap();
        cache.put(SongId::new("b"), &bytes(1)).unwrap();

        cache.clear().unwrap();

        assert!(cache.is_empty());
        assert_eq!(cache.total_size(), 0);
    }

    #[test]
    fn test_report_into_result() {
        let clean = EvictionReport {
            evicted: vec![SongId::new("a")],
            expired: 1,
            ..Default::default()
        };
        assert_eq!(clean.into_result().unwrap(), vec![SongId::new("a")]);

        let failed = EvictionReport {
            evicted: vec![SongId::new("a")],
            over_budget: 1,
            failures: vec![CacheFault::BackingStoreFailure {
                key: SongId::new("a"),
                message: "disk gone".to_string(),
            }],
            ..Default::default()
        };
        assert!(!failed.is_clean());
        assert!(matches!(
            failed.into_result(),
            Err(CacheFault::Eviction { failures }) if failures.len() == 1
        ));
    }
}
