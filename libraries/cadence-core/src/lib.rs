//! Cadence Core
//!
//! Platform-agnostic song types and catalog helpers shared by every Cadence crate.
//!
//! The core crate defines:
//! - **Domain Types**: `Song`, `SongId`, `ContentRef`, `SongMetadata`
//! - **Catalog**: `SongCatalog` with SHA-256 content deduplication
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{ContentRef, Song};
//! use std::time::Duration;
//!
//! let song = Song::builder("song-1", "Blue in Green")
//!     .artist("Miles Davis")
//!     .album("Kind of Blue")
//!     .duration(Duration::from_secs(337))
//!     .content(ContentRef::file("/music/blue-in-green.flac"))
//!     .build();
//!
//! assert_eq!(song.id.as_str(), "song-1");
//! assert!(!song.is_community());
//! ```

#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod types;

pub use catalog::{ContentDigest, SongCatalog};
pub use error::{CoreError, Result};
pub use types::{ByteRange, ContentRef, Song, SongBuilder, SongId, SongMetadata, COMMUNITY_UPLOADER};
