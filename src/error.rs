//! Error types for media-relay
//!
//! This module provides error handling for the library, including:
//! - The main [`Error`] type returned by every fallible operation
//! - Unit-level transfer failures ([`TransferError`])
//! - Requester-facing messages and stable machine-readable codes
//!
//! Retry classification of these errors lives in [`crate::retry`].

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for media-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// The platform asked us to back off for `wait` before trying again
    #[error("rate limited: retry after {}s", wait.as_secs())]
    RateLimited {
        /// How long the platform asked us to wait
        wait: Duration,
    },

    /// An external call did not finish within its ceiling
    #[error("operation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Transport-level failure reported by the messaging client
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The chat or peer is unknown to the client session
    #[error("invalid peer: {0}")]
    PeerInvalid(String),

    /// The client is not allowed to read from the chat
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A post link could not be parsed
    #[error("invalid post link: {0}")]
    InvalidLink(String),

    /// Message id interval with start after end
    #[error("invalid range: start ID {start} exceeds end ID {end}")]
    InvalidRange {
        /// First message id of the requested range
        start: i64,
        /// Last message id of the requested range
        end: i64,
    },

    /// Range endpoints that point at different chats
    #[error("range links point at different chats")]
    ChatMismatch,

    /// Message not found or inaccessible
    #[error("not found: {0}")]
    NotFound(String),

    /// Unit-level transfer failure
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// External tool execution failed (ffprobe, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled before it finished
    #[error("operation cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new transfers")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failures that belong to a single transfer unit
#[derive(Debug, Error)]
pub enum TransferError {
    /// The download finished but the file is zero bytes
    #[error("downloaded file {path} is empty")]
    EmptyFile {
        /// Where the download was written
        path: PathBuf,
    },

    /// The download finished but no file exists at the reported path
    #[error("downloaded file {path} was not saved")]
    FileMissing {
        /// Where the download was expected
        path: PathBuf,
    },

    /// The content is larger than the configured limit
    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    SizeRejected {
        /// Size of the content in bytes
        size: u64,
        /// The limit that was exceeded
        limit: u64,
    },

    /// None of the members of a media group could be downloaded
    #[error("no valid media in media group {group_id}")]
    NoValidMedia {
        /// The media group identifier
        group_id: String,
    },

    /// A state transition the unit state machine does not allow
    #[error("cannot move transfer from {from} to {to}")]
    InvalidTransition {
        /// State the unit was in
        from: String,
        /// State that was requested
        to: String,
    },
}

impl Error {
    /// Stable machine-readable code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::RateLimited { .. } => "rate_limited",
            Error::Timeout(_) => "timeout",
            Error::Transport(_) => "transport_error",
            Error::Io(_) => "io_error",
            Error::PeerInvalid(_) => "peer_invalid",
            Error::Forbidden(_) => "forbidden",
            Error::InvalidLink(_) => "invalid_link",
            Error::InvalidRange { .. } => "invalid_range",
            Error::ChatMismatch => "chat_mismatch",
            Error::NotFound(_) => "not_found",
            Error::Transfer(e) => match e {
                TransferError::EmptyFile { .. } => "empty_file",
                TransferError::FileMissing { .. } => "file_missing",
                TransferError::SizeRejected { .. } => "size_rejected",
                TransferError::NoValidMedia { .. } => "no_valid_media",
                TransferError::InvalidTransition { .. } => "invalid_transition",
            },
            Error::ExternalTool(_) => "external_tool_error",
            Error::Serialization(_) => "serialization_error",
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }

    /// The explanation shown to whoever requested the transfer
    pub fn user_message(&self) -> String {
        match self {
            Error::PeerInvalid(_) | Error::Forbidden(_) => {
                "Make sure the user client is part of the chat.".to_string()
            }
            Error::NotFound(_) => "Message not found or inaccessible.".to_string(),
            Error::InvalidRange { .. } => {
                "Invalid range: start ID cannot exceed end ID.".to_string()
            }
            Error::ChatMismatch => "Both links must be from the same channel.".to_string(),
            Error::InvalidLink(reason) => reason.clone(),
            Error::Transfer(TransferError::EmptyFile { .. }) => {
                "Download failed: File is empty".to_string()
            }
            Error::Transfer(TransferError::FileMissing { .. }) => {
                "Download failed: File not saved properly".to_string()
            }
            Error::Transfer(TransferError::SizeRejected { size, limit }) => format!(
                "File of {} exceeds the {} limit.",
                crate::utils::format_size(*size),
                crate::utils::format_size(*limit)
            ),
            Error::Transfer(TransferError::NoValidMedia { .. }) => {
                "Could not extract any valid media from the media group.".to_string()
            }
            Error::Cancelled => "Transfer cancelled.".to_string(),
            Error::ShuttingDown => "Shutting down, try again later.".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error is the policy skip for oversized content
    pub fn is_size_rejection(&self) -> bool {
        matches!(self, Error::Transfer(TransferError::SizeRejected { .. }))
    }
}
