//! External collaborator contracts.
//!
//! The hub never talks to storage directly. Session descriptors arrive
//! already loaded, queue-add resolves media through [`MediaLibrary`], and
//! the public stream endpoint serves bytes through [`MediaStreamer`].
//! Implementations live outside this crate (the standalone server ships a
//! filesystem-backed one).

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by library and streamer implementations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No media file with this ID exists.
    #[error("media file not found: {0}")]
    NotFound(String),

    /// The media file exists but its content is gone from storage.
    #[error("media file missing: {0}")]
    Missing(String),

    /// Underlying storage failure.
    #[error("library backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One record in the media library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: f32,
    /// True when the record exists but its content is unavailable.
    /// Missing files are excluded from search and rejected on queue-add.
    #[serde(default)]
    pub missing: bool,
}

/// A loaded session descriptor, handed to the hub by the session-creation
/// collaborator. The hub owns no persistence; whoever produces this is
/// responsible for durability.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub id: String,
    /// The authenticated user who created the session. Library reads on
    /// behalf of the session run under this user's authority.
    pub user_id: String,
    pub tracks: Vec<MediaFile>,
    pub format: Option<String>,
    pub max_bit_rate: Option<u32>,
}

/// Read access to the media library.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Resolves a single media file by ID.
    async fn get(&self, id: &str) -> Result<MediaFile, LibraryError>;

    /// Substring search over title/artist/album, executed under `user_id`'s
    /// read authority. Implementations must exclude missing files, sort by
    /// title, and return at most `limit` records.
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MediaFile>, LibraryError>;
}

/// Boxed byte stream for media content.
pub type MediaBody = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// An open media stream ready to be served.
pub struct MediaStream {
    pub content_type: String,
    pub body: MediaBody,
}

/// Serves media content for validated stream tokens.
#[async_trait]
pub trait MediaStreamer: Send + Sync {
    /// Opens a media file for streaming, applying the requested format and
    /// bit-rate cap when the implementation supports transcoding.
    async fn open(
        &self,
        media_file_id: &str,
        format: Option<&str>,
        max_bit_rate: Option<u32>,
    ) -> Result<MediaStream, LibraryError>;
}
