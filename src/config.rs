//! Configuration types for media-relay

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level relay configuration
///
/// Every field has a default, so `Config::default()` is a working single-slot
/// configuration and partial JSON/TOML documents deserialize cleanly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Working directory for transient downloads (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum simultaneous downloads across all transfers (default: 1)
    #[serde(default = "default_concurrency")]
    pub max_concurrent_downloads: usize,

    /// Maximum simultaneous uploads across all transfers (default: 1)
    #[serde(default = "default_concurrency")]
    pub max_concurrent_uploads: usize,

    /// Number of range jobs awaited together as one window (default: 1)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between range windows (default: 5 seconds)
    #[serde(default = "default_flood_wait_delay", with = "duration_serde")]
    pub flood_wait_delay: Duration,

    /// Ceiling for metadata calls and probe subprocesses (default: 60 seconds)
    #[serde(default = "default_call_timeout", with = "duration_serde")]
    pub call_timeout: Duration,

    /// Ceiling for a single media download or upload attempt (default: none)
    ///
    /// Large files legitimately take long; stalled transfers are caught by
    /// `stall_timeout` instead.
    #[serde(default, with = "optional_duration_serde")]
    pub transfer_timeout: Option<Duration>,

    /// Abandon a transfer attempt after this long without progress (default: 60 seconds)
    #[serde(default = "default_stall_timeout", with = "duration_serde")]
    pub stall_timeout: Duration,

    /// Retry behaviour shared by every call site
    #[serde(default)]
    pub retry: RetryConfig,

    /// Size limits for downloads and uploads
    #[serde(default)]
    pub limits: SizeLimits,

    /// External media tool locations
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_downloads: default_concurrency(),
            max_concurrent_uploads: default_concurrency(),
            batch_size: default_batch_size(),
            flood_wait_delay: default_flood_wait_delay(),
            call_timeout: default_call_timeout(),
            transfer_timeout: None,
            stall_timeout: default_stall_timeout(),
            retry: RetryConfig::default(),
            limits: SizeLimits::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Retry configuration for rate limits and transient failures
///
/// `max_attempts` counts every attempt including the first one. Rate-limit
/// waits never count as an attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before a transient failure becomes final (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after a failed download attempt (default: 2 seconds)
    #[serde(default = "default_download_delay", with = "duration_serde")]
    pub download_delay: Duration,

    /// Delay after a failed upload attempt (default: 3 seconds)
    #[serde(default = "default_upload_delay", with = "duration_serde")]
    pub upload_delay: Duration,

    /// Delay after a failed media group send or metadata call (default: 2 seconds)
    #[serde(default = "default_group_delay", with = "duration_serde")]
    pub group_delay: Duration,

    /// Added on top of every rate-limit wait (default: 1 second)
    #[serde(default = "default_rate_limit_padding", with = "duration_serde")]
    pub rate_limit_padding: Duration,

    /// Add random jitter to transient delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            download_delay: default_download_delay(),
            upload_delay: default_upload_delay(),
            group_delay: default_group_delay(),
            rate_limit_padding: default_rate_limit_padding(),
            jitter: false,
        }
    }
}

/// Size limits applied before download and before upload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SizeLimits {
    /// Largest file a regular account may download (default: 2 GiB)
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,

    /// Largest file a premium account may download (default: 4 GiB)
    #[serde(default = "default_premium_max_download_bytes")]
    pub premium_max_download_bytes: u64,

    /// Largest file that may be uploaded (default: 2 GiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_download_bytes: default_max_download_bytes(),
            premium_max_download_bytes: default_premium_max_download_bytes(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl SizeLimits {
    /// Download limit for an account of the given tier
    pub fn download_limit(&self, premium: bool) -> u64 {
        if premium {
            self.premium_max_download_bytes
        } else {
            self.max_download_bytes
        }
    }
}

/// External tool paths used for media probing and thumbnails
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the ffprobe binary (None = search PATH)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    /// Path to the ffmpeg binary (None = search PATH)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Search PATH for binaries that are not configured (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// Reads `MAX_CONCURRENT_DOWNLOADS`, `MAX_CONCURRENT_UPLOADS`, `BATCH_SIZE`,
    /// `FLOOD_WAIT_DELAY` (seconds) and `DOWNLOAD_DIR`. Unset variables keep
    /// their defaults; set but unparsable variables are a configuration error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = parse_var(&lookup, "MAX_CONCURRENT_DOWNLOADS")? {
            config.max_concurrent_downloads = value;
        }
        if let Some(value) = parse_var(&lookup, "MAX_CONCURRENT_UPLOADS")? {
            config.max_concurrent_uploads = value;
        }
        if let Some(value) = parse_var(&lookup, "BATCH_SIZE")? {
            config.batch_size = value;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "FLOOD_WAIT_DELAY")? {
            config.flood_wait_delay = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup("DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            config.download_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(config_error(
                "max_concurrent_downloads must be at least 1",
                "max_concurrent_downloads",
            ));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(config_error(
                "max_concurrent_uploads must be at least 1",
                "max_concurrent_uploads",
            ));
        }
        if self.batch_size == 0 {
            return Err(config_error("batch_size must be at least 1", "batch_size"));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error(
                "retry.max_attempts must be at least 1",
                "retry.max_attempts",
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(config_error(
                "call_timeout must be greater than zero",
                "call_timeout",
            ));
        }
        if self.transfer_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(config_error(
                "transfer_timeout must be greater than zero when set",
                "transfer_timeout",
            ));
        }
        if self.stall_timeout.is_zero() {
            return Err(config_error(
                "stall_timeout must be greater than zero",
                "stall_timeout",
            ));
        }
        Ok(())
    }

    /// Retry policy for media downloads
    pub fn download_policy(&self) -> RetryPolicy {
        self.policy(self.retry.download_delay, self.transfer_timeout)
    }

    /// Retry policy for single media uploads
    pub fn upload_policy(&self) -> RetryPolicy {
        self.policy(self.retry.upload_delay, self.transfer_timeout)
    }

    /// Retry policy for media group sends
    pub fn group_policy(&self) -> RetryPolicy {
        self.policy(self.retry.group_delay, self.transfer_timeout)
    }

    /// Retry policy for metadata calls (message lookups, text relays)
    pub fn metadata_policy(&self) -> RetryPolicy {
        self.policy(self.retry.group_delay, Some(self.call_timeout))
    }

    fn policy(&self, delay: Duration, call_timeout: Option<Duration>) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay,
            rate_limit_padding: self.retry.rate_limit_padding,
            call_timeout,
            jitter: self.retry.jitter,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| config_error(&format!("{key} must be a number, got {raw:?}"), key)),
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_concurrency() -> usize {
    1
}

fn default_batch_size() -> usize {
    1
}

fn default_flood_wait_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_stall_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_download_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_upload_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_group_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_rate_limit_padding() -> Duration {
    Duration::from_secs(1)
}

fn default_max_download_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_premium_max_download_bytes() -> u64 {
    4 * 1024 * 1024 * 1024
}

fn default_max_upload_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
