//! Core types for playback and queue state

use crate::error::FaultKind;
use cadence_core::SongId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// Nothing loaded
    Idle,

    /// Resolving content and loading the output
    Loading,

    /// Output is producing audio for the current song
    Playing,

    /// Paused mid-song
    Paused,

    /// Last play failed; see `last_error`
    Error,

    /// Current song completed naturally
    Ended,
}

impl PlaybackStatus {
    /// Whether a song is loaded on the output
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    Off,

    /// Loop current song only (handled by the controller)
    One,

    /// Loop entire queue
    All,
}

impl RepeatMode {
    /// Next mode in the `Off -> One -> All -> Off` rotation
    pub fn cycled(self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }
}

/// Where `add_to_queue` inserts a song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InsertPosition {
    /// Right after the current song
    Next,

    /// At the end of the queue
    #[default]
    End,
}

/// Snapshot of the controller state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_song_id: Option<SongId>,
    pub status: PlaybackStatus,
    pub position: Duration,
    /// `Duration::ZERO` while unknown
    pub duration: Duration,
    /// Always within `[0, 1]`
    pub volume: f32,
    pub last_error: Option<FaultKind>,
}

impl PlaybackState {
    pub fn new(volume: f32) -> Self {
        Self {
            current_song_id: None,
            status: PlaybackStatus::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: crate::volume::clamp(volume),
            last_error: None,
        }
    }

    /// Progress through the current song in `[0, 1]`; zero when duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(1.0)
    }
}
