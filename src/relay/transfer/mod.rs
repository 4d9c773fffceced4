//! Transfer execution -- per-unit state machine and media group aggregation.
//!
//! Split into focused submodules:
//! - [`unit`] - One message's download then upload, with cleanup
//! - [`upload`] - Upload payload preparation (probe metadata, thumbnails)
//! - [`group`] - Media groups: concurrent downloads, grouped send, per-item fallback

mod group;
mod unit;
mod upload;


pub(crate) use group::relay_group;
pub(crate) use unit::TransferUnit;

use crate::client::{MessagingClient, ProgressSink};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::MediaProbe;
use crate::relay::gates::ConcurrencyGates;
use crate::retry::{RetryNotice, RetryPolicy, with_retry_observed};
use crate::types::{ChatId, Event, Stage, TaskId, TransferOutcome};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, broadcast};
use tokio_util::sync::CancellationToken;

/// Shared state for everything one registered task does
#[derive(Clone)]
pub(crate) struct TransferContext {
    pub(crate) task_id: TaskId,
    pub(crate) cancel: CancellationToken,
    pub(crate) destination: ChatId,
    pub(crate) config: Arc<Config>,
    pub(crate) client: Arc<dyn MessagingClient>,
    pub(crate) probe: Arc<dyn MediaProbe>,
    pub(crate) gates: ConcurrencyGates,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) premium: Arc<OnceCell<bool>>,
}

impl TransferContext {
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run an external call under `policy`, reporting rate limits and retries as events
    pub(crate) async fn retry<T, F, Fut>(&self, policy: &RetryPolicy, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let task_id = self.task_id;
        let event_tx = &self.event_tx;
        with_retry_observed(
            policy,
            &self.cancel,
            |notice| {
                let event = match notice {
                    RetryNotice::RateLimited { wait } => Event::RateLimited { task_id, wait },
                    RetryNotice::Retrying {
                        attempt,
                        max_attempts,
                        ..
                    } => Event::Retrying {
                        task_id,
                        attempt,
                        max_attempts,
                    },
                };
                event_tx.send(event).ok();
            },
            operation,
        )
        .await
    }

    /// Progress reporter for one message and phase
    pub(crate) fn progress(&self, message_id: i64, stage: Stage) -> ProgressSink {
        ProgressSink::new(self.event_tx.clone(), self.task_id, message_id, stage)
    }

    /// Whether the client account gets the premium download limit
    ///
    /// The lookup runs under the metadata policy like any other call, and a
    /// successful answer is cached for the relay. A failed lookup counts as a
    /// regular account and is asked again next time.
    ///
    /// # Errors
    ///
    /// Only [`Error::Cancelled`] is returned.
    pub(crate) async fn is_premium(&self) -> Result<bool> {
        if let Some(premium) = self.premium.get() {
            return Ok(*premium);
        }

        let client = &self.client;
        match self
            .retry(&self.config.metadata_policy(), move || client.is_premium())
            .await
        {
            Ok(premium) => {
                self.premium.set(premium).ok();
                Ok(premium)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(
                    task_id = self.task_id.0,
                    error = %e,
                    "premium status lookup failed, using regular limits"
                );
                Ok(false)
            }
        }
    }
}

/// Run one transfer attempt, failing it once `progress` has been silent for `limit`
///
/// The silence clock starts when the attempt starts.
pub(crate) async fn watch_stall<T>(
    progress: &ProgressSink,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    progress.touch();
    tokio::select! {
        result = call => result,
        () = progress.stalled(limit) => Err(Error::Timeout(limit)),
    }
}

/// Terminal outcome for a transfer that stopped with `error`
///
/// Size policy rejections are skips, cancellation is its own outcome and
/// everything else is a failure carrying the requester-facing reason.
pub(crate) fn outcome_for_error(error: &Error) -> TransferOutcome {
    match error {
        Error::Cancelled => TransferOutcome::Cancelled,
        e if e.is_size_rejection() => TransferOutcome::Skipped {
            reason: e.user_message(),
        },
        e => TransferOutcome::Failed {
            reason: e.user_message(),
        },
    }
}
