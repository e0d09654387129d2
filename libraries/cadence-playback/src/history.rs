//! Playback history tracking
//!
//! Bounded record of previously-current songs, most recent at the back.

use cadence_core::Song;
use std::collections::VecDeque;

/// Playback history with bounded size
///
/// Ring buffer that discards the oldest entry when full.
#[derive(Debug, Clone)]
pub struct History {
    songs: VecDeque<Song>,
    max_size: usize,
}

impl History {
    /// Create new history with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            songs: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Add song to history
    ///
    /// If history is full, oldest song is discarded
    pub fn push(&mut self, song: Song) {
        if self.max_size == 0 {
            return;
        }
        if self.songs.len() >= self.max_size {
            self.songs.pop_front();
        }
        self.songs.push_back(song);
    }

    /// Most recent song
    pub fn peek(&self) -> Option<&Song> {
        self.songs.back()
    }

    /// All songs, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn clear(&mut self) {
        self.songs.clear();
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(20)
    }
}
