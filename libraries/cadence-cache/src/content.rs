//! Cached content payload and size accounting

use bytes::Bytes;
use cadence_core::SongMetadata;

/// Content stored for one song
///
/// The audio buffer is reference counted, so handing a copy to the playback
/// controller never duplicates the bytes and stays valid after eviction.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedContent {
    /// Encoded audio bytes
    pub audio: Bytes,

    /// Display metadata stored with the audio
    pub metadata: Option<SongMetadata>,

    /// Cover art, if fetched alongside the audio
    pub artwork: Option<Bytes>,
}

impl CachedContent {
    /// Audio-only content
    pub fn audio(audio: impl Into<Bytes>) -> Self {
        Self {
            audio: audio.into(),
            metadata: None,
            artwork: None,
        }
    }

    pub fn with_metadata(mut self, metadata: SongMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_artwork(mut self, artwork: impl Into<Bytes>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    /// Size charged against the cache budget
    ///
    /// Serialized metadata length + audio length + artwork length. Every code path
    /// that accounts for an entry goes through this function.
    pub fn estimate_size(&self) -> Result<u64, serde_json::Error> {
        let metadata = match &self.metadata {
            Some(metadata) => serde_json::to_vec(metadata)?.len() as u64,
            None => 0,
        };
        let artwork = self.artwork.as_ref().map_or(0, |art| art.len() as u64);

        Ok(metadata + self.audio.len() as u64 + artwork)
    }
}
