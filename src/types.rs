//! Core types for media-relay

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a registered task (single transfer, batch run or batch job)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric chat identifier of a destination chat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a source chat, either by public username or numeric id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRef {
    /// Public chat username (without the leading `@`)
    Username(String),
    /// Numeric chat id (private channels use the `-100` prefixed form)
    Id(i64),
}

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRef::Username(name) => write!(f, "@{name}"),
            ChatRef::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Location of a single post, parsed from a post link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLink {
    /// Chat the post lives in
    pub chat: ChatRef,
    /// Message id of the post
    pub message_id: i64,
    /// Forum topic the post was linked from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
}

/// Flavour of a sticker, which decides its file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StickerFlavour {
    /// Plain image sticker (.webp)
    Static,
    /// Lottie animation (.tgs)
    Animated,
    /// Video sticker (.webm)
    Video,
}

/// Media attached to a message, with the fields the pipeline needs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Media {
    /// Compressed photo
    Photo {
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// Video file
    Video {
        /// Original file name, if the sender kept one
        file_name: Option<String>,
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// Music file
    Audio {
        /// Original file name
        file_name: Option<String>,
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// Generic file
    Document {
        /// Original file name
        file_name: Option<String>,
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// Voice note
    Voice {
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// Round video message
    VideoNote {
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// GIF-style animation
    Animation {
        /// Original file name
        file_name: Option<String>,
        /// Reported size in bytes
        file_size: Option<u64>,
    },
    /// Sticker
    Sticker {
        /// Which sticker format this is
        flavour: StickerFlavour,
        /// Reported size in bytes
        file_size: Option<u64>,
    },
}

impl Media {
    /// The kind tag of this media
    pub fn kind(&self) -> MediaKind {
        match self {
            Media::Photo { .. } => MediaKind::Photo,
            Media::Video { .. } => MediaKind::Video,
            Media::Audio { .. } => MediaKind::Audio,
            Media::Document { .. } => MediaKind::Document,
            Media::Voice { .. } => MediaKind::Voice,
            Media::VideoNote { .. } => MediaKind::VideoNote,
            Media::Animation { .. } => MediaKind::Animation,
            Media::Sticker { .. } => MediaKind::Sticker,
        }
    }

    /// Original file name, for kinds that carry one
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Media::Video { file_name, .. }
            | Media::Audio { file_name, .. }
            | Media::Document { file_name, .. }
            | Media::Animation { file_name, .. } => file_name.as_deref(),
            _ => None,
        }
    }

    /// Size reported by the platform before download
    pub fn file_size(&self) -> Option<u64> {
        match self {
            Media::Photo { file_size }
            | Media::Video { file_size, .. }
            | Media::Audio { file_size, .. }
            | Media::Document { file_size, .. }
            | Media::Voice { file_size }
            | Media::VideoNote { file_size }
            | Media::Animation { file_size, .. }
            | Media::Sticker { file_size, .. } => *file_size,
        }
    }
}

/// The core's view of a resolved post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id within its chat
    pub id: i64,
    /// Chat the message was resolved from
    pub chat: ChatRef,
    /// Shared identifier of an album, if the message belongs to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_group_id: Option<String>,
    /// Attached media, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    /// Plain text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Caption attached to the media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Message {
    /// A message without media, group, text or caption
    pub fn new(chat: ChatRef, id: i64) -> Self {
        Self {
            id,
            chat,
            media_group_id: None,
            media: None,
            text: None,
            caption: None,
        }
    }

    /// Attach media
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Attach a text body
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach a caption
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Place the message in a media group
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.media_group_id = Some(group_id.into());
        self
    }

    /// Media kind, decided once from the attached media
    pub fn kind(&self) -> MediaKind {
        self.media.as_ref().map_or(MediaKind::None, Media::kind)
    }

    /// Text to relay for a text-only post (body first, then caption)
    pub fn relay_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .or(self.caption.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    /// True when the message carries neither media nor text
    pub fn is_blank(&self) -> bool {
        self.media.is_none() && self.relay_text().is_none()
    }
}

/// Media kind tag, carried explicitly through the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Compressed photo
    Photo,
    /// Video file
    Video,
    /// Music file
    Audio,
    /// Generic file
    Document,
    /// Voice note
    Voice,
    /// Round video message
    VideoNote,
    /// GIF-style animation
    Animation,
    /// Sticker
    Sticker,
    /// No media attached
    None,
}

impl MediaKind {
    /// Upload method for this kind (None for messages without media)
    pub fn send_as(self) -> Option<SendAs> {
        match self {
            MediaKind::Photo => Some(SendAs::Photo),
            MediaKind::Video => Some(SendAs::Video),
            MediaKind::Audio => Some(SendAs::Audio),
            MediaKind::Document
            | MediaKind::Voice
            | MediaKind::VideoNote
            | MediaKind::Animation
            | MediaKind::Sticker => Some(SendAs::Document),
            MediaKind::None => None,
        }
    }

    /// Whether members of this kind can be part of a grouped upload
    pub fn is_group_eligible(self) -> bool {
        matches!(
            self,
            MediaKind::Photo | MediaKind::Video | MediaKind::Document | MediaKind::Audio
        )
    }
}

/// Upload method used for a downloaded file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendAs {
    /// Sent as a photo
    Photo,
    /// Sent as a streamable video with duration, dimensions and thumbnail
    Video,
    /// Sent as audio with duration and tags
    Audio,
    /// Sent as a plain file
    Document,
}

/// Status of one transfer unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// Created, waiting for a download permit
    Pending,
    /// Holding a download permit, download in flight
    Downloading,
    /// File is on disk, download permit released
    Downloaded,
    /// Holding an upload permit, upload in flight
    Uploading,
    /// Delivered to the destination
    Done,
    /// Gave up with a reason
    Failed,
    /// Rejected by policy (size limits)
    Skipped,
}

impl UnitStatus {
    /// Whether the unit has finished
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Done | UnitStatus::Failed | UnitStatus::Skipped)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            UnitStatus::Failed | UnitStatus::Skipped => true,
            UnitStatus::Downloading => self == UnitStatus::Pending,
            UnitStatus::Downloaded => self == UnitStatus::Downloading,
            UnitStatus::Uploading => self == UnitStatus::Downloaded,
            UnitStatus::Done => self == UnitStatus::Uploading,
            UnitStatus::Pending => false,
        }
    }

    /// Lowercase name used in logs and errors
    pub fn as_str(self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Downloading => "downloading",
            UnitStatus::Downloaded => "downloaded",
            UnitStatus::Uploading => "uploading",
            UnitStatus::Done => "done",
            UnitStatus::Failed => "failed",
            UnitStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the post to relay comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A parsed post link, resolved through the client
    Link(PostLink),
    /// An already-resolved message
    Message(Message),
}

/// Request to relay one post to a destination chat
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    /// The source post
    pub source: Source,
    /// Chat that receives the re-uploaded media
    pub destination: ChatId,
}

impl TransferRequest {
    /// Request for a post that still needs resolving
    pub fn from_link(link: PostLink, destination: ChatId) -> Self {
        Self {
            source: Source::Link(link),
            destination,
        }
    }

    /// Request for an already-resolved message
    pub fn from_message(message: Message, destination: ChatId) -> Self {
        Self {
            source: Source::Message(message),
            destination,
        }
    }

    /// Message id of the source post
    pub fn message_id(&self) -> i64 {
        match &self.source {
            Source::Link(link) => link.message_id,
            Source::Message(message) => message.id,
        }
    }
}

/// Result of relaying one post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferOutcome {
    /// Single media delivered
    Delivered {
        /// Kind of the delivered media
        kind: MediaKind,
    },
    /// Text-only post relayed as text
    TextRelayed,
    /// Media group delivered, either grouped or item by item
    GroupDelivered {
        /// Members that reached the destination
        sent: usize,
        /// Members whose download failed
        download_failures: usize,
        /// Members whose individual upload failed after a fallback
        upload_failures: usize,
        /// Whether the grouped send failed and items were sent one by one
        fell_back: bool,
    },
    /// Rejected by policy
    Skipped {
        /// Requester-facing reason
        reason: String,
    },
    /// Gave up
    Failed {
        /// Requester-facing reason
        reason: String,
    },
    /// Cancelled before finishing
    Cancelled,
}

impl TransferOutcome {
    /// Whether something reached the destination
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            TransferOutcome::Delivered { .. }
                | TransferOutcome::TextRelayed
                | TransferOutcome::GroupDelivered { .. }
        )
    }
}

/// Final counters of a range run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Posts relayed (media, groups and text)
    pub downloaded: usize,
    /// Posts skipped (missing, empty, duplicate group member, size policy)
    pub skipped: usize,
    /// Posts that failed
    pub failed: usize,
    /// Whether the run was cancelled before walking the whole range
    pub cancelled: bool,
}

impl BatchSummary {
    /// Number of posts accounted for
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Transfer phase reported in progress events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fetching from the source chat
    Download,
    /// Sending to the destination chat
    Upload,
}

/// Event emitted during the transfer lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Transfer registered and waiting for a download permit
    Queued {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
    },

    /// Download permit acquired, download started
    Downloading {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
    },

    /// Byte progress of a download or upload (throttled)
    Progress {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
        /// Which phase is progressing
        stage: Stage,
        /// Bytes done so far
        current: u64,
        /// Total bytes (0 if unknown)
        total: u64,
    },

    /// File is on disk
    Downloaded {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
        /// Size of the downloaded file
        bytes: u64,
    },

    /// Upload permit acquired, upload started
    Uploading {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
    },

    /// The platform rate-limited a call; the unit is sleeping
    RateLimited {
        /// Task ID
        task_id: TaskId,
        /// Requested wait
        wait: Duration,
    },

    /// A transient failure spent an attempt
    Retrying {
        /// Task ID
        task_id: TaskId,
        /// Attempt that failed (1-based)
        attempt: u32,
        /// Total attempts allowed
        max_attempts: u32,
    },

    /// Post delivered to the destination
    Delivered {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
        /// Kind that was delivered
        kind: MediaKind,
    },

    /// Post skipped by policy
    Skipped {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
        /// Requester-facing reason
        reason: String,
    },

    /// Post failed
    Failed {
        /// Task ID
        task_id: TaskId,
        /// Source message ID
        message_id: i64,
        /// Requester-facing reason
        reason: String,
    },

    /// Media group delivered to the destination
    GroupDelivered {
        /// Task ID
        task_id: TaskId,
        /// Message id the group was reached through
        message_id: i64,
        /// Members that reached the destination
        sent: usize,
        /// Whether members were sent one by one
        fell_back: bool,
    },

    /// Grouped send failed, members are being sent one by one
    GroupFallback {
        /// Task ID
        task_id: TaskId,
        /// Media group identifier
        group_id: String,
        /// Members that will be sent individually
        members: usize,
    },

    /// Range run started
    BatchStarted {
        /// Task ID of the run
        task_id: TaskId,
        /// First message id
        start: i64,
        /// Last message id (inclusive)
        end: i64,
    },

    /// A window of range jobs finished
    WindowDrained {
        /// Task ID of the run
        task_id: TaskId,
        /// Message ids of the jobs in the window, in spawn order
        message_ids: Vec<i64>,
    },

    /// Range run finished
    BatchComplete {
        /// Task ID of the run
        task_id: TaskId,
        /// Final counters
        summary: BatchSummary,
    },

    /// A task observed cancellation
    Cancelled {
        /// Task ID
        task_id: TaskId,
    },

    /// Relay is shutting down
    Shutdown,
}
