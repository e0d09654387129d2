/// ID types for Cadence entities
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Song identifier
///
/// Opaque to the playback engine; the catalog decides its format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongId(String);

impl SongId {
    /// Create a new song ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random song ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SongId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SongId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
