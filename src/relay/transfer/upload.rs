//! Upload payload preparation

use crate::client::{MediaMetadata, UploadPayload};
use crate::media::{MediaInfo, MediaProbe};
use crate::types::SendAs;
use std::path::{Path, PathBuf};

/// Frame size sent when the probe cannot tell
const FALLBACK_WIDTH: u32 = 640;
const FALLBACK_HEIGHT: u32 = 480;

/// Build the upload for a downloaded file
///
/// Videos get duration, dimensions and a thumbnail written to `thumbnail`;
/// audio gets duration and tags. Probe failures never fail the upload, they
/// fall back to defaults.
pub(super) async fn prepare_payload(
    probe: &dyn MediaProbe,
    send_as: SendAs,
    path: PathBuf,
    caption: Option<String>,
    thumbnail: Option<&Path>,
) -> UploadPayload {
    let metadata = match send_as {
        SendAs::Video => video_metadata(probe, &path, thumbnail).await,
        SendAs::Audio => audio_metadata(probe, &path).await,
        SendAs::Photo | SendAs::Document => MediaMetadata::default(),
    };

    UploadPayload {
        send_as,
        path,
        caption,
        metadata,
    }
}

async fn probe_or_default(probe: &dyn MediaProbe, path: &Path) -> MediaInfo {
    match probe.probe(path).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(?path, probe = probe.name(), error = %e, "media probe failed, using defaults");
            MediaInfo::default()
        }
    }
}

async fn video_metadata(
    probe: &dyn MediaProbe,
    path: &Path,
    thumbnail: Option<&Path>,
) -> MediaMetadata {
    let info = probe_or_default(probe, path).await;

    let (width, height) = match (info.width, info.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => (FALLBACK_WIDTH, FALLBACK_HEIGHT),
    };

    let thumbnail = match thumbnail {
        Some(output) => probe.thumbnail(path, info.duration, output).await,
        None => None,
    };

    MediaMetadata {
        duration: info.duration,
        width: Some(width),
        height: Some(height),
        thumbnail,
        supports_streaming: true,
        ..MediaMetadata::default()
    }
}

async fn audio_metadata(probe: &dyn MediaProbe, path: &Path) -> MediaMetadata {
    let info = probe_or_default(probe, path).await;
    MediaMetadata {
        duration: info.duration,
        performer: info.artist,
        title: info.title,
        ..MediaMetadata::default()
    }
}
