/// Song domain type
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::SongId;

/// Uploader tag for community-contributed songs.
///
/// Community songs ship their audio inline with the record instead of a fetchable
/// reference, so playback resolves them without touching the content source.
pub const COMMUNITY_UPLOADER: &str = "community";

/// Where a song's audio bytes live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentRef {
    /// Remote resource reachable over HTTP(S)
    Url(String),

    /// Local file handle
    File(PathBuf),

    /// Bytes carried inline with the song record
    Inline(Bytes),
}

impl ContentRef {
    /// Reference a remote URL
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Reference a local file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Carry bytes inline
    pub fn inline(bytes: impl Into<Bytes>) -> Self {
        Self::Inline(bytes.into())
    }

    /// Inline bytes, if this reference carries them
    pub fn inline_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Inline(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Inclusive byte range for partial reads (HTTP `Range` semantics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,

    /// Last byte offset (inclusive); `None` reads to the end
    pub end: Option<u64>,
}

impl ByteRange {
    /// Range from `start` to the end of the content
    pub fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Range covering `start..=end`
    ///
    /// Returns `None` when `end < start`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (end >= start).then_some(Self {
            start,
            end: Some(end),
        })
    }

    /// Number of bytes requested, if bounded (saturates at `u64::MAX`)
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| (end - self.start).saturating_add(1))
    }

    /// Whether the range is bounded and empty (never true for a valid range)
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Render as an HTTP `Range` header value
    pub fn to_header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }

    /// Cut this range out of an in-memory buffer
    ///
    /// The end is clamped to the buffer; a start past the end yields an empty buffer.
    pub fn slice(&self, bytes: &Bytes) -> Bytes {
        let total = bytes.len() as u64;
        let start = self.start.min(total);
        let end = self
            .end
            .map_or(total, |end| end.saturating_add(1).min(total));
        bytes.slice(start as usize..end.max(start) as usize)
    }
}

/// Display metadata of a song, as stored next to cached content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub duration: Duration,
}

/// Song record supplied by the catalog
///
/// Immutable once created. A zero `duration` means the length is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Unique song identifier
    pub id: SongId,

    /// Song title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name
    pub album: String,

    /// Genre
    pub genre: String,

    /// Song duration (`Duration::ZERO` when unknown)
    pub duration: Duration,

    /// Where the audio bytes come from
    pub content_ref: ContentRef,

    /// Owner or source tag
    pub uploaded_by: Option<String>,
}

impl Song {
    /// Start building a song with an id and a title
    pub fn builder(id: impl Into<SongId>, title: impl Into<String>) -> SongBuilder {
        SongBuilder::new(id.into(), title.into())
    }

    /// Whether this is community content with inline bytes
    pub fn is_community(&self) -> bool {
        self.uploaded_by.as_deref() == Some(COMMUNITY_UPLOADER)
    }

    /// Whether the duration is known
    pub fn has_known_duration(&self) -> bool {
        !self.duration.is_zero()
    }

    /// Display metadata snapshot
    pub fn metadata(&self) -> SongMetadata {
        SongMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            genre: self.genre.clone(),
            duration: self.duration,
        }
    }
}

/// Builder for [`Song`]
#[derive(Debug, Clone)]
pub struct SongBuilder {
    song: Song,
}

impl SongBuilder {
    fn new(id: SongId, title: String) -> Self {
        Self {
            song: Song {
                id,
                title,
                artist: String::new(),
                album: String::new(),
                genre: String::new(),
                duration: Duration::ZERO,
                content_ref: ContentRef::Inline(Bytes::new()),
                uploaded_by: None,
            },
        }
    }

    pub fn artist(mut self, artist: impl Into<String>) -> Self {
        self.song.artist = artist.into();
        self
    }

    pub fn album(mut self, album: impl Into<String>) -> Self {
        self.song.album = album.into();
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.song.genre = genre.into();
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.song.duration = duration;
        self
    }

    pub fn content(mut self, content_ref: ContentRef) -> Self {
        self.song.content_ref = content_ref;
        self
    }

    pub fn uploaded_by(mut self, owner: impl Into<String>) -> Self {
        self.song.uploaded_by = Some(owner.into());
        self
    }

    /// Community upload carrying its bytes inline
    pub fn community(mut self, bytes: impl Into<Bytes>) -> Self {
        self.song.uploaded_by = Some(COMMUNITY_UPLOADER.to_string());
        self.song.content_ref = ContentRef::Inline(bytes.into());
        self
    }

    pub fn build(self) -> Song {
        self.song
    }
}
