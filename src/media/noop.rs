//! No-op media probe for graceful degradation

use super::traits::{MediaInfo, MediaProbe, ProbeCapabilities};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Media probe used when ffprobe/ffmpeg are unavailable
///
/// Every probe returns [`MediaInfo::default`] and no thumbnail is produced, so
/// videos are sent with the 640x480 fallback dimensions.
///
/// # Examples
///
/// ```
/// use media_relay::media::{MediaProbe, NoOpProbe};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let probe = NoOpProbe;
/// let info = probe.probe(Path::new("clip.mp4")).await?;
/// assert_eq!(info.duration, 0);
/// # Ok(())
/// # }
/// ```
pub struct NoOpProbe;

#[async_trait]
impl MediaProbe for NoOpProbe {
    async fn probe(&self, _path: &Path) -> crate::Result<MediaInfo> {
        Ok(MediaInfo::default())
    }

    async fn thumbnail(&self, _video: &Path, _duration: u64, _output: &Path) -> Option<PathBuf> {
        None
    }

    fn capabilities(&self) -> ProbeCapabilities {
        ProbeCapabilities {
            can_probe: false,
            can_thumbnail: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
