//! Local music scanning
//!
//! Walks files and directories, probes each audio file for its duration and admits
//! it to a catalog so byte-identical copies are only queued once.

use anyhow::Context;
use bytes::Bytes;
use cadence_core::{ContentRef, CoreError, Song, SongCatalog, SongId};
use cadence_playback::probe;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg", "oga", "m4a", "aac", "aiff"];

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Every audio file under `paths`, in sorted order per directory
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut entries = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .map(|entry| entry.map(|entry| entry.path()))
                .collect::<Result<Vec<_>, _>>()?;
            entries.sort();

            let (dirs, plain): (Vec<_>, Vec<_>) = entries.into_iter().partition(|p| p.is_dir());
            files.extend(plain.into_iter().filter(|p| is_audio_file(p)));
            files.extend(collect_files(&dirs)?);
        } else if is_audio_file(path) {
            files.push(path.clone());
        } else {
            warn!(path = %path.display(), "Skipping non-audio file");
        }
    }

    Ok(files)
}

/// Build songs for every playable file under `paths`
///
/// Files that fail to probe and duplicates of already admitted content are skipped.
pub fn scan(paths: &[PathBuf]) -> anyhow::Result<Vec<Song>> {
    let mut catalog = SongCatalog::new();
    let mut songs = Vec::new();

    for path in collect_files(paths)? {
        let bytes = Bytes::from(
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?,
        );

        let info = match probe(&bytes) {
            Ok(info) => info,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping unplayable file");
                continue;
            }
        };

        let title = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned());
        let song = Song::builder(SongId::generate(), title)
            .duration(info.duration.unwrap_or_default())
            .content(ContentRef::file(&path))
            .uploaded_by("local")
            .build();

        match catalog.admit(song.clone(), &bytes) {
            Ok(digest) => {
                debug!(path = %path.display(), %digest, "Found song");
                songs.push(song);
            }
            Err(CoreError::Duplicate { existing, .. }) => {
                let existing = catalog
                    .get(&existing)
                    .map_or_else(String::new, |song| song.title.clone());
                info!(path = %path.display(), duplicate_of = %existing, "Skipping duplicate content");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(songs)
}
