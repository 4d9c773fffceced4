//! Download-then-upload state machine for one message

use super::{TransferContext, watch_stall};
use super::upload::prepare_payload;
use crate::client::GroupItem;
use crate::error::{Error, Result, TransferError};
use crate::types::{Event, Media, MediaKind, Message, SendAs, Stage, TransferOutcome, UnitStatus};
use crate::utils::{ScratchFile, download_path, file_name_for, thumbnail_path};
use std::path::{Path, PathBuf};

/// One message moving through `pending → downloading → downloaded → uploading → done`
///
/// Holds at most one permit at a time: the download permit is released before
/// the upload permit is requested. Local files are tracked from the moment
/// their path is known, so partial downloads and thumbnails are deleted on
/// every exit path.
pub(crate) struct TransferUnit {
    message: Message,
    kind: MediaKind,
    caption: Option<String>,
    status: UnitStatus,
    size: u64,
    // Declared before `local` so it is dropped first and the message
    // directory is empty by the time `local` removes it.
    thumbnail: Option<ScratchFile>,
    local: Option<ScratchFile>,
}

impl TransferUnit {
    pub(crate) fn new(message: Message) -> Self {
        Self {
            kind: message.kind(),
            caption: message.caption.clone(),
            message,
            status: UnitStatus::Pending,
            size: 0,
            thumbnail: None,
            local: None,
        }
    }

    pub(crate) fn message_id(&self) -> i64 {
        self.message.id
    }

    pub(crate) fn kind(&self) -> MediaKind {
        self.kind
    }

    pub(crate) fn status(&self) -> UnitStatus {
        self.status
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn local_path(&self) -> Option<&Path> {
        self.local.as_ref().map(ScratchFile::path)
    }

    fn send_as(&self) -> SendAs {
        self.kind.send_as().unwrap_or(SendAs::Document)
    }

    fn transition(&mut self, next: UnitStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(TransferError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        tracing::debug!(
            message_id = self.message.id,
            from = %self.status,
            to = %next,
            "transfer state change"
        );
        self.status = next;
        Ok(())
    }

    /// Move to `skipped` (size policy) or `failed` after an error
    pub(crate) fn settle(&mut self, error: &Error) {
        let next = if error.is_size_rejection() {
            UnitStatus::Skipped
        } else {
            UnitStatus::Failed
        };
        if self.status.can_transition_to(next) {
            self.status = next;
        }
    }

    /// Download phase: `pending → downloading → downloaded`
    pub(crate) async fn download(&mut self, ctx: &TransferContext) -> Result<()> {
        let message_id = self.message.id;

        if let Some(size) = self.message.media.as_ref().and_then(Media::file_size) {
            let limit = ctx.config.limits.download_limit(ctx.is_premium().await?);
            if size > limit {
                return Err(TransferError::SizeRejected { size, limit }.into());
            }
        }

        let permit = ctx.gates.acquire_download(&ctx.cancel).await?;
        self.transition(UnitStatus::Downloading)?;
        ctx.emit(Event::Downloading {
            task_id: ctx.task_id,
            message_id,
        });

        let root = &ctx.config.download_dir;
        let path = download_path(
            root,
            ctx.task_id,
            message_id,
            &file_name_for(&self.message),
        );
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.local = Some(ScratchFile::within(root, &path));

        let client = &ctx.client;
        let message = &self.message;
        let target = path.as_path();
        let progress = ctx.progress(message_id, Stage::Download);
        let progress = &progress;
        let stall = ctx.config.stall_timeout;
        let written = ctx
            .retry(&ctx.config.download_policy(), move || {
                watch_stall(progress, stall, client.download(message, target, progress))
            })
            .await?;

        if written != path {
            self.local = Some(ScratchFile::within(root, &written));
        }

        let bytes = match tokio::fs::metadata(&written).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::FileMissing { path: written }.into());
            }
            Err(e) => return Err(e.into()),
        };
        if bytes == 0 {
            return Err(TransferError::EmptyFile { path: written }.into());
        }

        self.size = bytes;
        self.transition(UnitStatus::Downloaded)?;
        drop(permit);

        tracing::info!(
            task_id = ctx.task_id.0,
            message_id,
            bytes,
            "download complete"
        );
        ctx.emit(Event::Downloaded {
            task_id: ctx.task_id,
            message_id,
            bytes,
        });
        Ok(())
    }

    /// Upload phase: `downloaded → uploading → done`
    pub(crate) async fn upload(&mut self, ctx: &TransferContext) -> Result<()> {
        let message_id = self.message.id;
        let path = self
            .local_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| TransferError::FileMissing {
                path: PathBuf::from(message_id.to_string()),
            })?;

        let permit = ctx.gates.acquire_upload(&ctx.cancel).await?;
        self.transition(UnitStatus::Uploading)?;

        let limit = ctx.config.limits.max_upload_bytes;
        if self.size > limit {
            return Err(TransferError::SizeRejected {
                size: self.size,
                limit,
            }
            .into());
        }

        ctx.emit(Event::Uploading {
            task_id: ctx.task_id,
            message_id,
        });

        let send_as = self.send_as();
        let thumbnail = (send_as == SendAs::Video).then(|| thumbnail_path(&path));
        if let Some(thumb) = &thumbnail {
            self.thumbnail = Some(ScratchFile::within(&ctx.config.download_dir, thumb));
        }

        let payload = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
            payload = prepare_payload(
                ctx.probe.as_ref(),
                send_as,
                path,
                self.caption.clone(),
                thumbnail.as_deref(),
            ) => payload,
        };

        let client = &ctx.client;
        let destination = ctx.destination;
        let payload = &payload;
        let progress = ctx.progress(message_id, Stage::Upload);
        let progress = &progress;
        let stall = ctx.config.stall_timeout;
        ctx.retry(&ctx.config.upload_policy(), move || {
            watch_stall(progress, stall, client.upload(destination, payload, progress))
        })
        .await?;

        drop(permit);
        self.transition(UnitStatus::Done)?;
        tracing::info!(
            task_id = ctx.task_id.0,
            message_id,
            send_as = ?send_as,
            "upload complete"
        );
        Ok(())
    }

    /// Record that this unit was delivered as part of a grouped send
    pub(crate) fn mark_sent_in_group(&mut self) {
        let delivered = self
            .transition(UnitStatus::Uploading)
            .and_then(|()| self.transition(UnitStatus::Done));
        if let Err(e) = delivered {
            tracing::debug!(
                message_id = self.message.id,
                error = %e,
                "group member not marked as sent"
            );
        }
    }

    /// Member description for a grouped upload (only once downloaded)
    pub(crate) fn group_item(&self) -> Option<GroupItem> {
        if self.status != UnitStatus::Downloaded {
            return None;
        }
        Some(GroupItem {
            send_as: self.send_as(),
            path: self.local_path()?.to_path_buf(),
            caption: self.caption.clone(),
        })
    }

    /// Delete the thumbnail and the downloaded file (at most once)
    pub(crate) async fn cleanup(&mut self) {
        if let Some(thumb) = self.thumbnail.take() {
            thumb.remove().await;
        }
        if let Some(file) = self.local.take() {
            file.remove().await;
        }
    }

    /// Full pipeline for a standalone message; local files are gone on return
    pub(crate) async fn run(mut self, ctx: &TransferContext) -> TransferOutcome {
        ctx.emit(Event::Queued {
            task_id: ctx.task_id,
            message_id: self.message.id,
        });

        let result = match self.download(ctx).await {
            Ok(()) => self.upload(ctx).await,
            Err(e) => Err(e),
        };
        self.cleanup().await;

        match result {
            Ok(()) => TransferOutcome::Delivered { kind: self.kind },
            Err(e) => {
                self.settle(&e);
                super::outcome_for_error(&e)
            }
        }
    }
}
