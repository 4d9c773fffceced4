//! Utility functions for file naming, scratch files and human-readable output

use crate::types::{Media, Message, StickerFlavour, TaskId};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Format a byte count with binary units, rounded to two decimals
///
/// # Examples
///
/// ```
/// use media_relay::utils::format_size;
///
/// assert_eq!(format_size(0), "0B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded:?} {}", UNITS[unit])
}

/// Format a duration as compact days/hours/minutes/seconds
///
/// # Examples
///
/// ```
/// use media_relay::utils::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(0)), "0s");
/// assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut parts = Vec::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        let count = secs / size;
        if count > 0 {
            parts.push(format!("{count}{unit}"));
            secs %= size;
        }
    }
    parts.join(" ")
}

fn upload_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"^\d+_"))
}

fn index_before_letter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"^(\d+)\s*[a-zA-Z]"))
}

fn index_before_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"^\d+ "))
}

// Only called with the literal patterns above, which are covered by tests.
#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Tidy a source file name for re-upload
///
/// Drops a leading `123_` upload prefix, turns underscores into spaces and
/// renders a leading track/episode number as `N) `.
///
/// # Examples
///
/// ```
/// use media_relay::utils::clean_file_name;
///
/// assert_eq!(clean_file_name("1699999_my_song.mp3"), "my song.mp3");
/// assert_eq!(clean_file_name("01 Intro.mp3"), "01) Intro.mp3");
/// ```
#[must_use]
pub fn clean_file_name(name: &str) -> String {
    let name = upload_prefix_re().replace(name, "").replace('_', " ");

    let renumbered = index_before_letter_re().captures(&name).and_then(|found| {
        let whole = found.get(0)?;
        let index = found.get(1)?;
        // The match ends on one ASCII letter, which starts the rest.
        Some(format!("{}) {}", index.as_str(), &name[whole.end() - 1..]))
    });
    let name = renumbered.unwrap_or(name);

    if index_before_space_re().is_match(&name) {
        if let Some((index, rest)) = name.split_once(' ') {
            return format!("{index}) {rest}");
        }
    }
    name
}

/// File name a message's media is saved under
///
/// Uses the sender's file name when the media carries one, otherwise
/// `<message id>.<extension for the kind>`. Falls back to the bare message id
/// when cleaning leaves nothing.
#[must_use]
pub fn file_name_for(message: &Message) -> String {
    let id = message.id;
    let raw = match &message.media {
        Some(Media::Document { file_name, .. }) => file_name.clone().unwrap_or_default(),
        Some(Media::Video { file_name, .. }) => {
            file_name.clone().unwrap_or_else(|| format!("{id}.mp4"))
        }
        Some(Media::Audio { file_name, .. }) => {
            file_name.clone().unwrap_or_else(|| format!("{id}.mp3"))
        }
        Some(Media::Voice { .. }) => format!("{id}.ogg"),
        Some(Media::VideoNote { .. }) => format!("{id}.mp4"),
        Some(Media::Animation { file_name, .. }) => {
            file_name.clone().unwrap_or_else(|| format!("{id}.gif"))
        }
        Some(Media::Sticker { flavour, .. }) => match flavour {
            StickerFlavour::Animated => format!("{id}.tgs"),
            StickerFlavour::Video => format!("{id}.webm"),
            StickerFlavour::Static => format!("{id}.webp"),
        },
        Some(Media::Photo { .. }) => format!("{id}.jpg"),
        None => String::new(),
    };

    let cleaned = clean_file_name(&raw);
    // Strip separators so a crafted name cannot leave the message directory.
    let cleaned = cleaned.replace(['/', '\\'], " ");
    if cleaned.trim().is_empty() || cleaned.trim_matches('.').is_empty() {
        id.to_string()
    } else {
        cleaned
    }
}

/// Local path a message's media is downloaded to
///
/// `<download_dir>/<task_id>/<message_id>/<file_name>`. Message ids are only
/// unique within one chat, so the task id keeps two transfers of the same id
/// (from different chats, or the same link submitted twice) apart.
#[must_use]
pub fn download_path(
    download_dir: &Path,
    task_id: TaskId,
    message_id: i64,
    file_name: &str,
) -> PathBuf {
    download_dir
        .join(task_id.0.to_string())
        .join(message_id.to_string())
        .join(file_name)
}

/// Path for a video thumbnail next to the video it was taken from
#[must_use]
pub fn thumbnail_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    video.with_file_name(format!("{stem}.thumb.jpg"))
}

/// Transient local file that is deleted exactly once
///
/// Call [`ScratchFile::remove`] on every normal exit path. If the owner is
/// dropped first (task aborted, future dropped on cancellation), `Drop`
/// removes the file synchronously instead.
///
/// A file created with [`ScratchFile::within`] also takes the directories
/// between it and the root with it once they are empty. The root itself and
/// anything outside it are never touched.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    root: Option<PathBuf>,
    removed: bool,
}

impl ScratchFile {
    /// Track `path` for deletion. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: None,
            removed: false,
        }
    }

    /// Track `path` and prune its empty parent directories up to `root`
    pub fn within(root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            root: Some(root.into()),
            removed: false,
        }
    }

    /// Tracked path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file and then its empty parent directories below the root
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = ?self.path, "removed local file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = ?self.path, error = %e, "failed to remove local file"),
        }

        for dir in self.prunable_dirs() {
            // Fails while siblings (thumbnail, group members) are still present.
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
        }
    }

    /// Parent directories strictly below the root, innermost first
    fn prunable_dirs(&self) -> impl Iterator<Item = &Path> {
        let root = self.root.as_deref();
        self.path
            .ancestors()
            .skip(1)
            .take_while(move |dir| root.is_some_and(|root| dir.starts_with(root) && *dir != root))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = ?self.path, "removed scratch file on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "failed to remove scratch file")
            }
        }
        for dir in self.prunable_dirs() {
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
        }
    }
}
