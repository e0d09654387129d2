//! In-memory song catalog with content deduplication
//!
//! The catalog is the playback engine's view of the upload pipeline: a song is only
//! admitted when no other live song has byte-identical content (SHA-256 over the
//! full file).

use crate::error::{CoreError, Result};
use crate::types::{Song, SongId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// SHA-256 digest of a song's full content, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Hash the full content bytes
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of admitted songs keyed by id and content digest
#[derive(Debug, Default)]
pub struct SongCatalog {
    songs: HashMap<SongId, (Song, ContentDigest)>,
    by_digest: HashMap<ContentDigest, SongId>,
}

impl SongCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a song whose full content is `bytes`
    ///
    /// Rejects the song when its id is taken or when another song already has the
    /// same content digest.
    pub fn admit(&mut self, song: Song, bytes: &[u8]) -> Result<ContentDigest> {
        if self.songs.contains_key(&song.id) {
            return Err(CoreError::AlreadyRegistered(song.id));
        }

        let digest = ContentDigest::of(bytes);
        if let Some(existing) = self.by_digest.get(&digest) {
            debug!(song_id = %song.id, existing = %existing, "Rejecting duplicate upload");
            return Err(CoreError::Duplicate {
                existing: existing.clone(),
                digest: digest.to_string(),
            });
        }

        info!(song_id = %song.id, digest = %digest, "Song admitted to catalog");
        self.by_digest.insert(digest.clone(), song.id.clone());
        self.songs.insert(song.id.clone(), (song, digest.clone()));
        Ok(digest)
    }

    /// Look up a song by id
    pub fn get(&self, id: &SongId) -> Option<&Song> {
        self.songs.get(id).map(|(song, _)| song)
    }

    /// Remove a song, freeing its digest for future uploads
    pub fn remove(&mut self, id: &SongId) -> Result<Song> {
        let (song, digest) = self
            .songs
            .remove(id)
            .ok_or_else(|| CoreError::SongNotFound(id.clone()))?;
        self.by_digest.remove(&digest);
        Ok(song)
    }

    /// Whether content with this digest is already admitted
    pub fn contains_digest(&self, digest: &ContentDigest) -> bool {
        self.by_digest.contains_key(digest)
    }

    /// All songs, in no particular order
    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.songs.values().map(|(song, _)| song)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
