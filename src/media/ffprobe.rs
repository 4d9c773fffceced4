//! ffprobe/ffmpeg based media probe

use super::parser::parse_ffprobe_output;
use super::traits::{MediaInfo, MediaProbe, ProbeCapabilities};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Seconds used as the video length when the real one is unknown
const FALLBACK_DURATION_SECS: u64 = 3;

/// Media probe that runs the external `ffprobe` and `ffmpeg` binaries
///
/// Every subprocess is bounded by `timeout` and killed when it expires.
///
/// # Examples
///
/// ```no_run
/// use media_relay::media::{FfmpegProbe, MediaProbe};
/// use std::path::{Path, PathBuf};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit paths
/// let probe = FfmpegProbe::new(
///     PathBuf::from("/usr/bin/ffprobe"),
///     PathBuf::from("/usr/bin/ffmpeg"),
///     Duration::from_secs(60),
/// );
///
/// // Or auto-discover from PATH
/// let probe = FfmpegProbe::from_path(Duration::from_secs(60))
///     .expect("ffprobe/ffmpeg not found in PATH");
///
/// let info = probe.probe(Path::new("clip.mp4")).await?;
/// # Ok(())
/// # }
/// ```
pub struct FfmpegProbe {
    ffprobe_path: PathBuf,
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegProbe {
    /// Create a probe with explicit binary paths
    pub fn new(ffprobe_path: PathBuf, ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            ffmpeg_path,
            timeout,
        }
    }

    /// Attempt to find both binaries in PATH
    ///
    /// Returns `None` unless both `ffprobe` and `ffmpeg` are found.
    pub fn from_path(timeout: Duration) -> Option<Self> {
        let ffprobe = which::which("ffprobe").ok()?;
        let ffmpeg = which::which("ffmpeg").ok()?;
        Some(Self::new(ffprobe, ffmpeg, timeout))
    }

    async fn run(&self, mut command: Command, tool: &str) -> crate::Result<Output> {
        command.kill_on_drop(true);
        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output
                .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute {tool}: {e}"))),
            Err(_) => Err(crate::Error::ExternalTool(format!(
                "{tool} timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Seek position for the thumbnail frame, in whole seconds
fn thumbnail_offset(duration: u64) -> u64 {
    let duration = if duration == 0 {
        FALLBACK_DURATION_SECS
    } else {
        duration
    };
    duration / 2
}

#[async_trait]
impl MediaProbe for FfmpegProbe {
    async fn probe(&self, path: &Path) -> crate::Result<MediaInfo> {
        let mut command = Command::new(&self.ffprobe_path);
        command
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);

        let output = self.run(command, "ffprobe").await?;
        if !output.status.success() {
            return Err(crate::Error::ExternalTool(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_ffprobe_output(&output.stdout)
    }

    async fn thumbnail(&self, video: &Path, duration: u64, output: &Path) -> Option<PathBuf> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-ss")
            .arg(thumbnail_offset(duration).to_string())
            .arg("-i")
            .arg(video)
            .args(["-vframes", "1", "-q:v", "2", "-y"])
            .arg(output);

        match self.run(command, "ffmpeg").await {
            Ok(result) if result.status.success() && output.exists() => Some(output.to_path_buf()),
            Ok(result) => {
                tracing::warn!(
                    video = ?video,
                    stderr = %String::from_utf8_lossy(&result.stderr).trim(),
                    "thumbnail generation failed"
                );
                None
            }
            Err(e) => {
                tracing::warn!(video = ?video, error = %e, "thumbnail generation error");
                None
            }
        }
    }

    fn capabilities(&self) -> ProbeCapabilities {
        ProbeCapabilities {
            can_probe: true,
            can_thumbnail: true,
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
