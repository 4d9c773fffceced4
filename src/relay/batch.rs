//! Range runs over consecutive message ids
//!
//! Ids are resolved one by one in increasing order. Every relayable post is
//! spawned as its own job (registered as a child of the run), and jobs are
//! awaited together in windows of `batch_size` with a pause between windows.

use super::Relay;
use super::single::{emit_outcome, relay_message};
use super::transfer::TransferContext;
use crate::error::{Error, Result};
use crate::links::parse_post_link;
use crate::retry::sleep_cancellable;
use crate::types::{BatchSummary, ChatId, ChatRef, Event, Message, TransferOutcome};
use futures::future::join_all;
use std::collections::HashSet;
use tokio::task::JoinHandle;

/// Jobs spawned but not yet awaited, in spawn order
type Window = Vec<(i64, JoinHandle<TransferOutcome>)>;

impl Relay {
    /// Relay every post with an id in `start..=end` from `chat`
    ///
    /// Missing, empty and already-covered media group posts are counted as
    /// skipped. Cancellation stops the run after the current window and is
    /// reported through [`BatchSummary::cancelled`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRange`] when `start > end` (before any network
    /// call) and [`Error::ShuttingDown`] once shutdown has started.
    pub async fn submit_range(
        &self,
        chat: ChatRef,
        start: i64,
        end: i64,
        destination: ChatId,
    ) -> Result<BatchSummary> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        self.ensure_accepting()?;

        let guard = self.registry.register();
        let ctx = self.context(&guard.handle(), destination);

        tracing::info!(
            task_id = ctx.task_id.0,
            chat = %chat,
            start,
            end,
            batch_size = self.config.batch_size,
            "range run started"
        );
        ctx.emit(Event::BatchStarted {
            task_id: ctx.task_id,
            start,
            end,
        });

        self.warm_up(&ctx, &chat).await;
        let summary = self.walk_range(&ctx, &chat, start, end).await;

        if summary.cancelled {
            ctx.emit(Event::Cancelled {
                task_id: ctx.task_id,
            });
        }
        tracing::info!(
            task_id = ctx.task_id.0,
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "range run finished"
        );
        ctx.emit(Event::BatchComplete {
            task_id: ctx.task_id,
            summary,
        });
        Ok(summary)
    }

    /// Relay the range between two post links of the same chat
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLink`] for a malformed link and
    /// [`Error::ChatMismatch`] when the links point at different chats, both
    /// before any network call.
    pub async fn submit_range_links(
        &self,
        start_link: &str,
        end_link: &str,
        destination: ChatId,
    ) -> Result<BatchSummary> {
        let start = parse_post_link(start_link)?;
        let end = parse_post_link(end_link)?;
        if start.chat != end.chat {
            return Err(Error::ChatMismatch);
        }
        self.submit_range(start.chat, start.message_id, end.message_id, destination)
            .await
    }

    /// Best-effort membership check so the peer is known before resolving
    async fn warm_up(&self, ctx: &TransferContext, chat: &ChatRef) {
        let client = &ctx.client;
        match ctx
            .retry(&self.config.metadata_policy(), move || {
                client.is_member_of_chat(chat)
            })
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(chat = %chat, "client is not a member of the source chat"),
            Err(e) => tracing::warn!(chat = %chat, error = %e, "membership check failed"),
        }
    }

    async fn walk_range(
        &self,
        ctx: &TransferContext,
        chat: &ChatRef,
        start: i64,
        end: i64,
    ) -> BatchSummary {
        let batch_size = self.config.batch_size;
        let mut summary = BatchSummary::default();
        let mut seen_groups: HashSet<String> = HashSet::new();
        let mut window: Window = Vec::with_capacity(batch_size);

        for message_id in start..=end {
            if ctx.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let client = &ctx.client;
            let resolved = ctx
                .retry(&self.config.metadata_policy(), move || {
                    client.resolve_message(chat, message_id)
                })
                .await;
            let message = match resolved {
                Ok(Some(message)) if !message.is_blank() => message,
                Ok(_) => {
                    tracing::debug!(task_id = ctx.task_id.0, message_id, "nothing to relay, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Err(Error::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        task_id = ctx.task_id.0,
                        message_id,
                        error = %e,
                        "could not resolve message"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            let repeated_group = message
                .media_group_id
                .as_ref()
                .is_some_and(|group_id| !seen_groups.insert(group_id.clone()));
            if repeated_group {
                tracing::debug!(
                    task_id = ctx.task_id.0,
                    message_id,
                    group_id = ?message.media_group_id,
                    "media group already relayed, skipping"
                );
                summary.skipped += 1;
                continue;
            }

            window.push((message_id, self.spawn_job(ctx, message)));

            if window.len() >= batch_size {
                drain_window(ctx, &mut window, &mut summary).await;
                if summary.cancelled {
                    break;
                }
                if message_id < end
                    && sleep_cancellable(self.config.flood_wait_delay, &ctx.cancel)
                        .await
                        .is_err()
                {
                    summary.cancelled = true;
                    break;
                }
            }
        }

        if !window.is_empty() {
            drain_window(ctx, &mut window, &mut summary).await;
        }
        summary
    }

    /// Spawn the relay of one resolved post as a child task of the run
    fn spawn_job(&self, batch: &TransferContext, message: Message) -> JoinHandle<TransferOutcome> {
        let guard = self.registry.register_child(&batch.cancel);
        let ctx = self.context(&guard.handle(), batch.destination);

        tracing::debug!(
            task_id = batch.task_id.0,
            job_id = guard.id().0,
            message_id = message.id,
            "range job spawned"
        );

        tokio::spawn(async move {
            let _guard = guard;
            let message_id = message.id;
            let outcome = relay_message(&ctx, message).await;
            emit_outcome(&ctx, message_id, &outcome);
            outcome
        })
    }
}

/// Await every job of the window and fold the outcomes into `summary`
async fn drain_window(ctx: &TransferContext, window: &mut Window, summary: &mut BatchSummary) {
    let (message_ids, jobs): (Vec<i64>, Vec<JoinHandle<TransferOutcome>>) =
        window.drain(..).unzip();

    for (message_id, joined) in message_ids.iter().zip(join_all(jobs).await) {
        match joined {
            Ok(outcome) => fold(summary, &outcome),
            Err(e) => {
                tracing::error!(
                    task_id = ctx.task_id.0,
                    message_id,
                    error = %e,
                    "range job panicked"
                );
                summary.failed += 1;
            }
        }
    }

    tracing::debug!(task_id = ctx.task_id.0, ?message_ids, "window drained");
    ctx.emit(Event::WindowDrained {
        task_id: ctx.task_id,
        message_ids,
    });
}

fn fold(summary: &mut BatchSummary, outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Delivered { .. }
        | TransferOutcome::TextRelayed
        | TransferOutcome::GroupDelivered { .. } => summary.downloaded += 1,
        TransferOutcome::Skipped { .. } => summary.skipped += 1,
        TransferOutcome::Failed { .. } => summary.failed += 1,
        TransferOutcome::Cancelled => summary.cancelled = true,
    }
}
