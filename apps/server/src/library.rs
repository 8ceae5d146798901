//! Manifest-backed media library.
//!
//! The standalone server has no music database; it serves a directory of
//! files described by a YAML manifest. Each entry carries the metadata the
//! hub needs (title, artist, album, duration) plus a path, relative to the
//! configured media directory. Entries whose file is absent at load time
//! are marked missing: they stay visible to `get` but are excluded from
//! search and rejected on queue-add.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chorus_core::{LibraryError, MediaFile, MediaLibrary, MediaStream, MediaStreamer};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

/// One manifest entry: media metadata plus the file it points at.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(default)]
    duration: f32,
    path: PathBuf,
}

#[derive(Debug)]
struct Entry {
    media: MediaFile,
    path: PathBuf,
}

/// Filesystem-backed implementation of the library collaborators.
///
/// `user_id` is ignored on search: the manifest is a single-user library,
/// so the session creator's authority covers all of it.
pub struct FsMediaLibrary {
    entries: Vec<Entry>,
}

impl FsMediaLibrary {
    /// Loads the manifest and resolves every entry against `media_dir`.
    pub fn load(manifest_path: &Path, media_dir: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(manifest_path).with_context(|| {
            format!("Failed to read library manifest: {}", manifest_path.display())
        })?;
        let parsed: Vec<ManifestEntry> = serde_yaml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse library manifest: {}",
                manifest_path.display()
            )
        })?;

        let entries: Vec<Entry> = parsed
            .into_iter()
            .map(|entry| {
                let path = if entry.path.is_absolute() {
                    entry.path
                } else {
                    media_dir.join(&entry.path)
                };
                let missing = !path.is_file();
                if missing {
                    log::warn!(
                        "[Library] media file missing on disk: {} ({})",
                        entry.id,
                        path.display()
                    );
                }
                Entry {
                    media: MediaFile {
                        id: entry.id,
                        title: entry.title,
                        artist: entry.artist,
                        album: entry.album,
                        duration: entry.duration,
                        missing,
                    },
                    path,
                }
            })
            .collect();

        log::info!(
            "[Library] loaded {} entries from {}",
            entries.len(),
            manifest_path.display()
        );
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.media.id == id)
    }
}

#[async_trait]
impl MediaLibrary for FsMediaLibrary {
    async fn get(&self, id: &str) -> Result<MediaFile, LibraryError> {
        self.find(id)
            .map(|entry| entry.media.clone())
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }

    async fn search(
        &self,
        _user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MediaFile>, LibraryError> {
        let needle = query.to_lowercase();
        let mut matches: Vec<MediaFile> = self
            .entries
            .iter()
            .filter(|entry| !entry.media.missing)
            .filter(|entry| {
                let media = &entry.media;
                media.title.to_lowercase().contains(&needle)
                    || media.artist.to_lowercase().contains(&needle)
                    || media.album.to_lowercase().contains(&needle)
            })
            .map(|entry| entry.media.clone())
            .collect();
        matches.sort_by(|a, b| a.title.cmp(&b.title));
        matches.truncate(limit);
        Ok(matches)
    }
}

#[async_trait]
impl MediaStreamer for FsMediaLibrary {
    async fn open(
        &self,
        media_file_id: &str,
        format: Option<&str>,
        max_bit_rate: Option<u32>,
    ) -> Result<MediaStream, LibraryError> {
        let entry = self
            .find(media_file_id)
            .ok_or_else(|| LibraryError::NotFound(media_file_id.to_string()))?;
        if entry.media.missing {
            return Err(LibraryError::Missing(media_file_id.to_string()));
        }

        // No transcoding pipeline here; the original bytes are served and
        // the requested format/bit-rate are advisory.
        if format.is_some() || max_bit_rate.is_some() {
            log::debug!(
                "[Library] transcode not supported, serving original: {}",
                media_file_id
            );
        }

        let file = tokio::fs::File::open(&entry.path).await?;
        Ok(MediaStream {
            content_type: content_type_for(&entry.path).to_string(),
            body: Box::pin(ReaderStream::new(file)),
        })
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") | Some("opus") => "audio/ogg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    fn write_library(dir: &Path) -> PathBuf {
        for name in ["one.mp3", "two.flac"] {
            let mut file = std::fs::File::create(dir.join(name)).unwrap();
            file.write_all(b"audio-bytes").unwrap();
        }
        let manifest = dir.join("library.yaml");
        std::fs::write(
            &manifest,
            concat!(
                "- id: mf-1\n",
                "  title: Banana Boat\n",
                "  artist: Harry\n",
                "  album: Calypso\n",
                "  duration: 187.0\n",
                "  path: one.mp3\n",
                "- id: mf-2\n",
                "  title: Abyss\n",
                "  artist: Banana Collective\n",
                "  duration: 90.0\n",
                "  path: two.flac\n",
                "- id: mf-3\n",
                "  title: Banana Ghost\n",
                "  duration: 10.0\n",
                "  path: nope.mp3\n",
            ),
        )
        .unwrap();
        manifest
    }

    #[tokio::test]
    async fn get_resolves_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_library(dir.path());
        let library = FsMediaLibrary::load(&manifest, dir.path()).unwrap();

        let media = library.get("mf-1").await.unwrap();
        assert_eq!(media.title, "Banana Boat");
        assert!(!media.missing);

        assert!(matches!(
            library.get("ghost").await,
            Err(LibraryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn absent_files_are_marked_missing() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_library(dir.path());
        let library = FsMediaLibrary::load(&manifest, dir.path()).unwrap();

        let media = library.get("mf-3").await.unwrap();
        assert!(media.missing);
    }

    #[tokio::test]
    async fn search_matches_any_field_sorted_by_title() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_library(dir.path());
        let library = FsMediaLibrary::load(&manifest, dir.path()).unwrap();

        // "banana" hits mf-1 by title and mf-2 by artist; missing mf-3 is
        // excluded even though its title matches.
        let results = library.search("user", "banana", 20).await.unwrap();
        let titles: Vec<&str> = results.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Abyss", "Banana Boat"]);
    }

    #[tokio::test]
    async fn search_honors_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_library(dir.path());
        let library = FsMediaLibrary::load(&manifest, dir.path()).unwrap();

        let results = library.search("user", "banana", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Abyss");
    }

    #[tokio::test]
    async fn open_streams_bytes_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_library(dir.path());
        let library = FsMediaLibrary::load(&manifest, dir.path()).unwrap();

        let mut stream = library.open("mf-1", None, None).await.unwrap();
        assert_eq!(stream.content_type, "audio/mpeg");

        let mut collected = Vec::new();
        while let Some(chunk) = stream.body.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"audio-bytes");
    }

    #[tokio::test]
    async fn open_rejects_missing_media() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_library(dir.path());
        let library = FsMediaLibrary::load(&manifest, dir.path()).unwrap();

        assert!(matches!(
            library.open("mf-3", None, None).await,
            Err(LibraryError::Missing(_))
        ));
    }

    #[test]
    fn content_types_cover_common_audio() {
        assert_eq!(content_type_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("a.FLAC")), "audio/flac");
        assert_eq!(content_type_for(Path::new("a.opus")), "audio/ogg");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("bad.yaml");
        std::fs::write(&manifest, "not: [valid").unwrap();
        assert!(FsMediaLibrary::load(&manifest, dir.path()).is_err());
    }
}
