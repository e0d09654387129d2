//! Player configuration

use cadence_cache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the player facade and its components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Maximum history size (default: 20)
    pub history_size: usize,

    /// Initial volume in `[0, 1]` (default: 0.8)
    pub volume: f32,

    /// Fixed shuffle seed; `None` seeds from entropy
    pub shuffle_seed: Option<u64>,

    /// `previous` restarts the current song when further in than this (default: 3s)
    pub restart_threshold_ms: u64,

    /// Capacity of the event broadcast channel (default: 256)
    pub event_capacity: usize,

    /// Content cache settings
    pub cache: CacheConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            history_size: 20,
            volume: 0.8,
            shuffle_seed: None,
            restart_threshold_ms: 3000,
            event_capacity: 256,
            cache: CacheConfig::default(),
        }
    }
}

impl PlayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed shuffle seed
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn with_history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_millis(self.restart_threshold_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".to_string());
        }

        if !self.volume.is_finite() {
            return Err("volume must be a finite number".to_string());
        }

        self.cache.validate()
    }
}
