//! Single post entry point

use super::Relay;
use super::transfer::{TransferContext, TransferUnit, outcome_for_error, relay_group};
use crate::error::Result;
use crate::links::parse_post_link;
use crate::types::{
    ChatId, Event, MediaKind, Message, Source, TransferOutcome, TransferRequest,
};

const NOT_FOUND: &str = "Message not found or inaccessible.";
const NOTHING_TO_RELAY: &str = "No media or text found in the post URL.";

impl Relay {
    /// Relay one post to the destination chat
    ///
    /// Runs as its own registered task, so [`Relay::cancel_all`] stops it.
    /// Failures of the transfer itself are reported through the returned
    /// [`TransferOutcome`]; an `Err` means the request was not accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`](crate::Error::ShuttingDown) once
    /// shutdown has started.
    pub async fn submit_single(&self, request: TransferRequest) -> Result<TransferOutcome> {
        self.ensure_accepting()?;

        let guard = self.registry.register();
        let ctx = self.context(&guard.handle(), request.destination);
        let message_id = request.message_id();

        tracing::info!(
            task_id = guard.id().0,
            message_id,
            destination = request.destination.0,
            "single transfer submitted"
        );

        let outcome = run_transfer(&ctx, request.source).await;
        emit_outcome(&ctx, message_id, &outcome);
        Ok(outcome)
    }

    /// Parse a post link and relay it
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLink`](crate::Error::InvalidLink) before any
    /// network call if the link is malformed.
    pub async fn submit_link(&self, link: &str, destination: ChatId) -> Result<TransferOutcome> {
        let link = parse_post_link(link)?;
        self.submit_single(TransferRequest::from_link(link, destination))
            .await
    }
}

/// Resolve `source` and relay it as media, media group or text
pub(crate) async fn run_transfer(ctx: &TransferContext, source: Source) -> TransferOutcome {
    let message = match source {
        Source::Message(message) => message,
        Source::Link(link) => {
            let client = &ctx.client;
            let chat = &link.chat;
            let message_id = link.message_id;
            match ctx
                .retry(&ctx.config.metadata_policy(), move || {
                    client.resolve_message(chat, message_id)
                })
                .await
            {
                Ok(Some(message)) => message,
                Ok(None) => {
                    return TransferOutcome::Failed {
                        reason: NOT_FOUND.to_string(),
                    };
                }
                Err(e) => return outcome_for_error(&e),
            }
        }
    };

    relay_message(ctx, message).await
}

/// Relay an already-resolved message
pub(crate) async fn relay_message(ctx: &TransferContext, message: Message) -> TransferOutcome {
    if message.media_group_id.is_some() && message.kind() != MediaKind::None {
        return relay_group(ctx, &message).await;
    }

    if message.media.is_some() {
        return TransferUnit::new(message).run(ctx).await;
    }

    let Some(text) = message.relay_text() else {
        return TransferOutcome::Failed {
            reason: NOTHING_TO_RELAY.to_string(),
        };
    };

    let client = &ctx.client;
    let destination = ctx.destination;
    match ctx
        .retry(&ctx.config.metadata_policy(), move || {
            client.send_text(destination, text)
        })
        .await
    {
        Ok(()) => TransferOutcome::TextRelayed,
        Err(e) => outcome_for_error(&e),
    }
}

/// Emit the single terminal event for a finished post and log it
pub(crate) fn emit_outcome(ctx: &TransferContext, message_id: i64, outcome: &TransferOutcome) {
    let task_id = ctx.task_id;
    let event = match outcome {
        TransferOutcome::Delivered { kind } => {
            tracing::info!(task_id = task_id.0, message_id, kind = ?kind, "post delivered");
            Event::Delivered {
                task_id,
                message_id,
                kind: *kind,
            }
        }
        TransferOutcome::TextRelayed => {
            tracing::info!(task_id = task_id.0, message_id, "text relayed");
            Event::Delivered {
                task_id,
                message_id,
                kind: MediaKind::None,
            }
        }
        TransferOutcome::GroupDelivered {
            sent,
            download_failures,
            upload_failures,
            fell_back,
        } => {
            tracing::info!(
                task_id = task_id.0,
                message_id,
                sent,
                download_failures,
                upload_failures,
                fell_back,
                "media group delivered"
            );
            Event::GroupDelivered {
                task_id,
                message_id,
                sent: *sent,
                fell_back: *fell_back,
            }
        }
        TransferOutcome::Skipped { reason } => {
            tracing::info!(task_id = task_id.0, message_id, reason = %reason, "post skipped");
            Event::Skipped {
                task_id,
                message_id,
                reason: reason.clone(),
            }
        }
        TransferOutcome::Failed { reason } => {
            tracing::warn!(task_id = task_id.0, message_id, reason = %reason, "post failed");
            Event::Failed {
                task_id,
                message_id,
                reason: reason.clone(),
            }
        }
        TransferOutcome::Cancelled => {
            tracing::info!(task_id = task_id.0, message_id, "post cancelled");
            Event::Cancelled { task_id }
        }
    };
    ctx.emit(event);
}
