mod ids;
mod song;

pub use ids::SongId;
pub use song::{ByteRange, ContentRef, Song, SongBuilder, SongMetadata, COMMUNITY_UPLOADER};
