//! Traits and types for media probing

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Metadata read from a media file
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    /// Duration in whole seconds (0 if unknown)
    pub duration: u64,
    /// Width of the first video stream
    pub width: Option<u32>,
    /// Height of the first video stream
    pub height: Option<u32>,
    /// Artist tag
    pub artist: Option<String>,
    /// Title tag
    pub title: Option<String>,
}

/// Capabilities of a media probe implementation
#[derive(Debug, Clone, Copy)]
pub struct ProbeCapabilities {
    /// Can read duration, dimensions and tags
    pub can_probe: bool,
    /// Can extract a thumbnail frame from a video
    pub can_thumbnail: bool,
}

/// Trait for reading media metadata and making thumbnails
///
/// Both operations are best-effort from the relay's point of view: a failed
/// probe falls back to defaults and a missing thumbnail just means the video
/// is sent without one.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Read duration, video dimensions and audio tags from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the external tool cannot be run, exits with a
    /// failure, or produces output that cannot be parsed.
    async fn probe(&self, path: &Path) -> crate::Result<MediaInfo>;

    /// Grab a single frame from the middle of `video` and write it to `output`
    ///
    /// `duration` is the video length in seconds (0 = unknown). Returns the
    /// written path, or `None` if no thumbnail could be produced.
    async fn thumbnail(&self, video: &Path, duration: u64, output: &Path) -> Option<PathBuf>;

    /// Query capabilities of this probe
    fn capabilities(&self) -> ProbeCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
