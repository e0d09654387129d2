//! Backing stores for cached content
//!
//! The cache index lives in memory; the bytes live in a [`CacheStore`]. Every write
//! carries the entry's generation so a late delete for an evicted generation can
//! never remove content written by a newer `put` of the same song.

use crate::content::CachedContent;
use bytes::Bytes;
use cadence_core::{SongId, SongMetadata};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage backend for cache entries
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Store content for `key` at `generation`, replacing older generations
    ///
    /// Writing an older generation over a newer one must leave the newer content.
    fn write(&self, key: &SongId, generation: u64, content: &CachedContent) -> io::Result<()>;

    /// Read content for `key` if the stored generation matches
    fn read(&self, key: &SongId, generation: u64) -> io::Result<Option<CachedContent>>;

    /// Delete content for `key` at `generation`; missing content is not an error
    fn delete(&self, key: &SongId, generation: u64) -> io::Result<()>;

    /// Delete everything
    fn clear(&self) -> io::Result<()>;

    /// Whether calls do blocking file I/O and belong off the async runtime
    fn blocks_on_io(&self) -> bool {
        false
    }
}

/// In-memory store (default)
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<SongId, (u64, CachedContent)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn write(&self, key: &SongId, generation: u64, content: &CachedContent) -> io::Result<()> {
        let mut entries = self.entries.write();
        // A slower writer of an older generation must not clobber a newer one
        if !entries.get(key).is_some_and(|(stored, _)| *stored > generation) {
            entries.insert(key.clone(), (generation, content.clone()));
        }
        Ok(())
    }

    fn read(&self, key: &SongId, generation: u64) -> io::Result<Option<CachedContent>> {
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|(stored, _)| *stored == generation)
            .map(|(_, content)| content.clone()))
    }

    fn delete(&self, key: &SongId, generation: u64) -> io::Result<()> {
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|(stored, _)| *stored == generation) {
            entries.remove(key);
        }
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

const AUDIO_FILE: &str = "audio.bin";
const METADATA_FILE: &str = "metadata.json";
const ARTWORK_FILE: &str = "artwork.bin";

/// On-disk store: one directory per entry generation
///
/// Directory names are the SHA-256 of the song id plus the generation, so arbitrary
/// ids never reach the filesystem.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open (and create if needed) a store rooted at `root`
    ///
    /// The index does not survive a restart, so entries left by an earlier run are
    /// unreachable and get removed here. Files the store did not name are kept.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let store = Self { root };
        let swept = store.remove_entries()?;
        debug!(root = %store.root.display(), swept, "Opened disk cache store");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_prefix(key: &SongId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn entry_dir(&self, key: &SongId, generation: u64) -> PathBuf {
        self.root
            .join(format!("{}-{}", Self::key_prefix(key), generation))
    }

    /// Remove every entry directory, returning how many went
    fn remove_entries(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_str().is_some_and(is_entry_name) {
                remove_dir_if_exists(&entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove every generation of `key` older than `keep`
    fn remove_older_generations(&self, key: &SongId, keep: u64) -> io::Result<()> {
        let prefix = format!("{}-", Self::key_prefix(key));

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let older = name
                .to_str()
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|generation| generation.parse::<u64>().ok())
                .is_some_and(|generation| generation < keep);
            if older {
                remove_dir_if_exists(&entry.path())?;
            }
        }
        Ok(())
    }
}

/// `<sha256 hex>-<generation>`, optionally with the staging extension
fn is_entry_name(name: &str) -> bool {
    let name = name.strip_suffix(".partial").unwrap_or(name);
    name.split_once('-').is_some_and(|(digest, generation)| {
        digest.len() == 64
            && digest.bytes().all(|byte| byte.is_ascii_hexdigit())
            && generation.parse::<u64>().is_ok()
    })
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

impl CacheStore for DiskStore {
    fn write(&self, key: &SongId, generation: u64, content: &CachedContent) -> io::Result<()> {
        let final_dir = self.entry_dir(key, generation);
        let staging = final_dir.with_extension("partial");
        remove_dir_if_exists(&staging)?;
        fs::create_dir_all(&staging)?;

        fs::write(staging.join(AUDIO_FILE), &content.audio)?;
        if let Some(metadata) = &content.metadata {
            let json = serde_json::to_vec(metadata)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            fs::write(staging.join(METADATA_FILE), json)?;
        }
        if let Some(artwork) = &content.artwork {
            fs::write(staging.join(ARTWORK_FILE), artwork)?;
        }

        remove_dir_if_exists(&final_dir)?;
        fs::rename(&staging, &final_dir)?;
        self.remove_older_generations(key, generation)
    }

    fn read(&self, key: &SongId, generation: u64) -> io::Result<Option<CachedContent>> {
        let dir = self.entry_dir(key, generation);
        let Some(audio) = read_optional(&dir.join(AUDIO_FILE))? else {
            return Ok(None);
        };

        let metadata = match read_optional(&dir.join(METADATA_FILE))? {
            Some(json) => Some(
                serde_json::from_slice::<SongMetadata>(&json)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?,
            ),
            None => None,
        };
        let artwork = read_optional(&dir.join(ARTWORK_FILE))?.map(Bytes::from);

        Ok(Some(CachedContent {
            audio: Bytes::from(audio),
            metadata,
            artwork,
        }))
    }

    fn delete(&self, key: &SongId, generation: u64) -> io::Result<()> {
        remove_dir_if_exists(&self.entry_dir(key, generation))
    }

    fn clear(&self) -> io::Result<()> {
        self.remove_entries().map(|_| ())
    }

    fn blocks_on_io(&self) -> bool {
        true
    }
}
