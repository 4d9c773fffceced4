//! Media probing and thumbnails
//!
//! Uploads of videos and audio carry metadata (duration, dimensions, tags)
//! and videos get a thumbnail. This module provides a trait-based seam for
//! obtaining both, so the relay runs with or without ffmpeg installed.
//!
//! ## Architecture
//!
//! The core abstraction is the [`MediaProbe`] trait. Two implementations are
//! provided:
//!
//! - [`FfmpegProbe`]: runs `ffprobe` and `ffmpeg` as subprocesses
//! - [`NoOpProbe`]: returns defaults and no thumbnail
//!
//! [`probe_from_config`] picks one from the tool configuration.
//!
//! ## Usage
//!
//! ```no_run
//! use media_relay::media::{FfmpegProbe, MediaProbe};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let probe = FfmpegProbe::from_path(Duration::from_secs(60))
//!         .expect("ffprobe/ffmpeg not found");
//!
//!     let info = probe.probe(Path::new("clip.mp4")).await?;
//!     println!("{}s, {:?}x{:?}", info.duration, info.width, info.height);
//!     Ok(())
//! }
//! ```

mod ffprobe;
mod noop;
mod parser;
mod traits;

pub use ffprobe::FfmpegProbe;
pub use noop::NoOpProbe;
pub use parser::parse_ffprobe_output;
pub use traits::{MediaInfo, MediaProbe, ProbeCapabilities};

use crate::config::Config;
use std::sync::Arc;

/// Build the probe described by the tool configuration
///
/// Explicit binary paths win; otherwise PATH is searched when allowed. Falls
/// back to [`NoOpProbe`] when either binary is missing.
pub fn probe_from_config(config: &Config) -> Arc<dyn MediaProbe> {
    let tools = &config.tools;
    let find = |configured: &Option<std::path::PathBuf>, name: &str| {
        configured
            .clone()
            .or_else(|| tools.search_path.then(|| which::which(name).ok()).flatten())
    };

    let probe: Arc<dyn MediaProbe> = match (
        find(&tools.ffprobe_path, "ffprobe"),
        find(&tools.ffmpeg_path, "ffmpeg"),
    ) {
        (Some(ffprobe), Some(ffmpeg)) => {
            Arc::new(FfmpegProbe::new(ffprobe, ffmpeg, config.call_timeout))
        }
        _ => {
            tracing::warn!(
                "ffprobe/ffmpeg not available, uploads will carry default metadata and no thumbnails"
            );
            Arc::new(NoOpProbe)
        }
    };

    let caps = probe.capabilities();
    tracing::info!(
        media_probe = probe.name(),
        can_probe = caps.can_probe,
        can_thumbnail = caps.can_thumbnail,
        "media probe initialized"
    );
    probe
}
