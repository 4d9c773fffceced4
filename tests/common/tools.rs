//! Helpers for tests that need real ffprobe/ffmpeg binaries

use std::path::{Path, PathBuf};

/// Binaries from `FFPROBE_PATH`/`FFMPEG_PATH` (read from `.env` too) or PATH
pub fn media_tools() -> Option<(PathBuf, PathBuf)> {
    dotenvy::dotenv().ok();
    let ffprobe = std::env::var_os("FFPROBE_PATH")
        .map(PathBuf::from)
        .or_else(|| which::which("ffprobe").ok())?;
    let ffmpeg = std::env::var_os("FFMPEG_PATH")
        .map(PathBuf::from)
        .or_else(|| which::which("ffmpeg").ok())?;
    Some((ffprobe, ffmpeg))
}

/// Render a short test pattern video with an audio tone
pub async fn render_sample_video(ffmpeg: &Path, output: &Path) -> bool {
    tokio::process::Command::new(ffmpeg)
        .args(["-hide_banner", "-loglevel", "error"])
        .args(["-f", "lavfi", "-i", "testsrc=duration=4:size=320x240:rate=10"])
        .args(["-f", "lavfi", "-i", "sine=frequency=440:duration=4"])
        .args(["-shortest", "-metadata", "title=Sample", "-y"])
        .arg(output)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Skip test if ffprobe/ffmpeg are not available
#[macro_export]
macro_rules! skip_if_no_media_tools {
    () => {
        match $crate::common::media_tools() {
            Some(tools) => tools,
            None => {
                eprintln!("Skipping test: ffprobe/ffmpeg not found");
                return;
            }
        }
    };
}
