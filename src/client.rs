//! Messaging client seam
//!
//! The relay never talks to the messaging platform directly. Everything it
//! needs (resolving posts, moving bytes, relaying text) goes through
//! [`MessagingClient`], which the embedding application implements on top of
//! its protocol library.
//!
//! Implementations map platform failures onto the crate [`Error`](crate::Error):
//!
//! | Platform failure            | Error variant                  |
//! |-----------------------------|--------------------------------|
//! | flood wait of N seconds     | `Error::RateLimited { wait }`  |
//! | unknown peer / bad chat id  | `Error::PeerInvalid`           |
//! | no access to the chat       | `Error::Forbidden`             |
//! | network and RPC hiccups     | `Error::Transport`             |

use crate::error::Result;
use crate::types::{ChatId, ChatRef, Event, Message, SendAs, Stage, TaskId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Metadata attached to a single upload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Duration in whole seconds (video and audio)
    pub duration: u64,
    /// Frame width (video)
    pub width: Option<u32>,
    /// Frame height (video)
    pub height: Option<u32>,
    /// Artist tag (audio)
    pub performer: Option<String>,
    /// Title tag (audio)
    pub title: Option<String>,
    /// Thumbnail image (video)
    pub thumbnail: Option<PathBuf>,
    /// Whether the video may be streamed before it is fully received
    pub supports_streaming: bool,
}

/// A single file to upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPayload {
    /// Upload method
    pub send_as: SendAs,
    /// Local file to send
    pub path: PathBuf,
    /// Caption carried over from the source post
    pub caption: Option<String>,
    /// Kind-specific metadata
    pub metadata: MediaMetadata,
}

/// One member of a grouped upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupItem {
    /// Upload method
    pub send_as: SendAs,
    /// Local file to send
    pub path: PathBuf,
    /// Caption carried over from the source member
    pub caption: Option<String>,
}

/// Trait for the messaging platform client
///
/// Every method is a single call to the platform. Retrying, rate-limit
/// handling, timeouts and cancellation are done by the relay around these
/// calls, so implementations should fail fast and let the error through.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Resolve a post; `None` when it does not exist or is empty
    async fn resolve_message(&self, chat: &ChatRef, message_id: i64) -> Result<Option<Message>>;

    /// All members of the anchor's media group, in their original order
    async fn resolve_message_group(&self, anchor: &Message) -> Result<Vec<Message>>;

    /// Download the message's media to `destination` and return the written path
    async fn download(
        &self,
        message: &Message,
        destination: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf>;

    /// Upload one file to the destination chat
    async fn upload(
        &self,
        destination: ChatId,
        payload: &UploadPayload,
        progress: &ProgressSink,
    ) -> Result<()>;

    /// Upload several files as one grouped post
    ///
    /// `progress` counts bytes across all members.
    async fn upload_group(
        &self,
        destination: ChatId,
        items: &[GroupItem],
        progress: &ProgressSink,
    ) -> Result<()>;

    /// Send a plain text message
    async fn send_text(&self, destination: ChatId, text: &str) -> Result<()>;

    /// Whether the client account can see the chat
    ///
    /// Also used to warm up the peer cache before walking a range.
    async fn is_member_of_chat(&self, chat: &ChatRef) -> Result<bool>;

    /// Whether the client account has the larger premium download limit
    async fn is_premium(&self) -> Result<bool>;
}

/// Default minimum gap between two progress events of one transfer
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Progress reporter handed to client downloads and uploads
///
/// Turns byte counters into throttled [`Event::Progress`] events. The final
/// report (`current == total`) is always emitted.
///
/// Every report also counts as activity: a transfer whose client stops
/// reporting for the configured stall timeout is abandoned and retried, so
/// implementations should report at least once per received or sent chunk.
#[derive(Debug)]
pub struct ProgressSink {
    target: Option<(broadcast::Sender<Event>, TaskId, i64)>,
    stage: Stage,
    interval: Duration,
    last_emit: Mutex<Option<Instant>>,
    last_activity: Mutex<Instant>,
}

impl ProgressSink {
    /// Reporter that broadcasts progress of `message_id` under `task_id`
    pub fn new(
        event_tx: broadcast::Sender<Event>,
        task_id: TaskId,
        message_id: i64,
        stage: Stage,
    ) -> Self {
        Self {
            target: Some((event_tx, task_id, message_id)),
            stage,
            interval: PROGRESS_INTERVAL,
            last_emit: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Reporter that drops every update
    pub fn disabled(stage: Stage) -> Self {
        Self {
            target: None,
            stage,
            interval: PROGRESS_INTERVAL,
            last_emit: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Override the minimum gap between events
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Phase this reporter belongs to
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Report `current` of `total` bytes done
    pub fn report(&self, current: u64, total: u64) {
        self.touch();
        let Some((event_tx, task_id, message_id)) = &self.target else {
            return;
        };

        let now = Instant::now();
        let finished = total > 0 && current >= total;
        {
            let Ok(mut last) = self.last_emit.lock() else {
                return;
            };
            let due = last.is_none_or(|at| now.duration_since(at) >= self.interval);
            if !due && !finished {
                return;
            }
            *last = Some(now);
        }

        event_tx
            .send(Event::Progress {
                task_id: *task_id,
                message_id: *message_id,
                stage: self.stage,
                current,
                total,
            })
            .ok();
    }

    /// Mark the transfer as active right now
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    /// Time since the last report (or [`touch`](Self::touch))
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    /// Resolve once nothing has been reported for `limit`
    pub async fn stalled(&self, limit: Duration) {
        loop {
            let idle = self.idle_for();
            if idle >= limit {
                return;
            }
            tokio::time::sleep(limit - idle).await;
        }
    }
}
