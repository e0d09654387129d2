//! Error types for playback, queue navigation and the player facade

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faults surfaced by the playback controller
///
/// None of these are fatal: the controller stays usable for the next `play`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackFault {
    /// Superseded by a newer play, or the controller shut down
    #[error("Playback aborted")]
    Aborted,

    /// Content could not be fetched
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Content was fetched but could not be decoded
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Container or codec is not supported by the output
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The output device is missing or has been released
    #[error("Output device unavailable: {0}")]
    ResourceUnavailable(String),
}

impl PlaybackFault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Aborted => FaultKind::Aborted,
            Self::NetworkFailure(_) => FaultKind::NetworkFailure,
            Self::DecodeFailure(_) => FaultKind::DecodeFailure,
            Self::UnsupportedFormat(_) => FaultKind::UnsupportedFormat,
            Self::ResourceUnavailable(_) => FaultKind::ResourceUnavailable,
        }
    }
}

/// Stable fault kind kept in `PlaybackState::last_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    Aborted,
    NetworkFailure,
    DecodeFailure,
    UnsupportedFormat,
    ResourceUnavailable,
}

/// Queue validation errors
///
/// Queue operations are all-or-nothing: when one of these is returned the queue
/// is unchanged.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum QueueFault {
    #[error("Index {index} out of bounds for queue of length {len}")]
    InvalidIndex { index: usize, len: usize },

    #[error("Queue is empty")]
    EmptyQueue,
}

/// Errors returned by the player facade
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    #[error(transparent)]
    Queue(#[from] QueueFault),

    #[error(transparent)]
    Playback(#[from] PlaybackFault),

    /// Nothing to play: no argument, no current song and an empty queue
    #[error("Nothing to play")]
    NothingToPlay,
}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueFault>;

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_kinds_are_stable() {
        assert_eq!(PlaybackFault::Aborted.kind(), FaultKind::Aborted);
        assert_eq!(
            PlaybackFault::NetworkFailure("timeout".into()).kind(),
            FaultKind::NetworkFailure
        );
        assert_eq!(
            PlaybackFault::ResourceUnavailable("gone".into()).kind(),
            FaultKind::ResourceUnavailable
        );
    }

    #[test]
    fn player_error_wraps_faults() {
        let err: PlayerError = QueueFault::EmptyQueue.into();
        assert_eq!(err.to_string(), "Queue is empty");

        let err: PlayerError = PlaybackFault::DecodeFailure("bad frame".into()).into();
        assert_eq!(err.to_string(), "Decode failure: bad frame");
    }
}
