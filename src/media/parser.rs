//! Parser for ffprobe JSON output

use super::traits::MediaInfo;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Parse the output of `ffprobe -print_format json -show_format -show_streams`
///
/// Duration comes from the container and is rounded to whole seconds. Tags
/// are matched case-insensitively. Dimensions come from the first video
/// stream.
///
/// # Errors
///
/// Returns [`Error::Serialization`](crate::Error::Serialization) if the output
/// is not valid ffprobe JSON.
pub fn parse_ffprobe_output(stdout: &[u8]) -> crate::Result<MediaInfo> {
    let output: ProbeOutput = serde_json::from_slice(stdout)?;

    let duration = output
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map_or(0, |d| d.round() as u64);

    let tag = |name: &str| {
        output
            .format
            .tags
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_empty())
            .map(|(_, value)| value.clone())
    };

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(MediaInfo {
        duration,
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        artist: tag("artist"),
        title: tag("title"),
    })
}
