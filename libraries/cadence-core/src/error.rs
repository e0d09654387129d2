/// Core error types for Cadence
use thiserror::Error;

use crate::types::SongId;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Cadence
#[derive(Error, Debug)]
pub enum CoreError {
    /// Song content duplicates a song already in the catalog
    #[error("Duplicate content: {existing} already has digest {digest}")]
    Duplicate { existing: SongId, digest: String },

    /// A song with the same id is already registered
    #[error("Song already registered: {0}")]
    AlreadyRegistered(SongId),

    /// Song not found
    #[error("Song not found: {0}")]
    SongNotFound(SongId),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
