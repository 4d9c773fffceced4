//! Media group relaying
//!
//! Members are downloaded concurrently (each bounded by the download gate),
//! sent as one grouped post under a single upload permit, and sent one by one
//! if the grouped send fails.

use super::{TransferContext, TransferUnit, outcome_for_error, watch_stall};
use crate::client::GroupItem;
use crate::error::{Error, TransferError};
use crate::types::{Event, Message, Stage, TransferOutcome, UnitStatus};
use futures::future::join_all;

/// Counters collected while relaying one media group
#[derive(Debug, Default)]
struct GroupTally {
    download_failures: usize,
    upload_failures: usize,
}

/// Relay every eligible member of `anchor`'s media group
///
/// Local files of all members are deleted before this returns.
pub(crate) async fn relay_group(ctx: &TransferContext, anchor: &Message) -> TransferOutcome {
    let group_id = anchor.media_group_id.clone().unwrap_or_default();

    let client = &ctx.client;
    let members = match ctx
        .retry(&ctx.config.metadata_policy(), move || {
            client.resolve_message_group(anchor)
        })
        .await
    {
        Ok(members) => members,
        Err(e) => return outcome_for_error(&e),
    };

    let mut units: Vec<TransferUnit> = members
        .into_iter()
        .filter(|member| member.kind().is_group_eligible())
        .map(TransferUnit::new)
        .collect();

    tracing::info!(
        task_id = ctx.task_id.0,
        group_id = %group_id,
        members = units.len(),
        "relaying media group"
    );

    let outcome = relay_units(ctx, &group_id, &mut units).await;

    for unit in &mut units {
        unit.cleanup().await;
    }
    outcome
}

async fn relay_units(
    ctx: &TransferContext,
    group_id: &str,
    units: &mut [TransferUnit],
) -> TransferOutcome {
    let mut tally = GroupTally::default();

    for unit in units.iter() {
        ctx.emit(Event::Queued {
            task_id: ctx.task_id,
            message_id: unit.message_id(),
        });
    }

    let results = join_all(units.iter_mut().map(|unit| unit.download(ctx))).await;

    let mut cancelled = false;
    for (unit, result) in units.iter_mut().zip(results) {
        if let Err(e) = result {
            if matches!(e, Error::Cancelled) {
                cancelled = true;
            } else {
                tracing::warn!(
                    task_id = ctx.task_id.0,
                    group_id,
                    message_id = unit.message_id(),
                    error = %e,
                    "group member download failed"
                );
                tally.download_failures += 1;
            }
            unit.settle(&e);
        }
    }
    if cancelled || ctx.cancel.is_cancelled() {
        return TransferOutcome::Cancelled;
    }

    let limit = ctx.config.limits.max_upload_bytes;
    for unit in units.iter_mut() {
        if unit.status() == UnitStatus::Downloaded && unit.size() > limit {
            let rejected: Error = TransferError::SizeRejected {
                size: unit.size(),
                limit,
            }
            .into();
            tracing::warn!(
                task_id = ctx.task_id.0,
                group_id,
                message_id = unit.message_id(),
                error = %rejected,
                "group member too large to upload"
            );
            unit.settle(&rejected);
            unit.cleanup().await;
            tally.upload_failures += 1;
        }
    }

    let items: Vec<GroupItem> = units.iter().filter_map(TransferUnit::group_item).collect();
    if items.is_empty() {
        let error: Error = TransferError::NoValidMedia {
            group_id: group_id.to_string(),
        }
        .into();
        return TransferOutcome::Failed {
            reason: error.user_message(),
        };
    }

    let grouped = {
        let permit = match ctx.gates.acquire_upload(&ctx.cancel).await {
            Ok(permit) => permit,
            Err(e) => return outcome_for_error(&e),
        };
        let client = &ctx.client;
        let destination = ctx.destination;
        let items = items.as_slice();
        let lead = units
            .iter()
            .find(|unit| unit.status() == UnitStatus::Downloaded)
            .map_or(0, TransferUnit::message_id);
        let progress = ctx.progress(lead, Stage::Upload);
        let progress = &progress;
        let stall = ctx.config.stall_timeout;
        let result = ctx
            .retry(&ctx.config.group_policy(), move || {
                watch_stall(
                    progress,
                    stall,
                    client.upload_group(destination, items, progress),
                )
            })
            .await;
        // Released before any fallback upload asks for its own permit.
        drop(permit);
        result
    };

    match grouped {
        Ok(()) => {
            for unit in units.iter_mut() {
                if unit.status() == UnitStatus::Downloaded {
                    unit.mark_sent_in_group();
                }
            }
            tracing::info!(
                task_id = ctx.task_id.0,
                group_id,
                sent = items.len(),
                "media group delivered"
            );
            TransferOutcome::GroupDelivered {
                sent: items.len(),
                download_failures: tally.download_failures,
                upload_failures: tally.upload_failures,
                fell_back: false,
            }
        }
        Err(Error::Cancelled) => TransferOutcome::Cancelled,
        Err(e) => fall_back(ctx, group_id, units, items.len(), tally, e).await,
    }
}

/// Send the downloaded members one at a time after a failed grouped send
async fn fall_back(
    ctx: &TransferContext,
    group_id: &str,
    units: &mut [TransferUnit],
    members: usize,
    mut tally: GroupTally,
    grouped_error: Error,
) -> TransferOutcome {
    tracing::warn!(
        task_id = ctx.task_id.0,
        group_id,
        members,
        error = %grouped_error,
        "grouped send failed, sending members individually"
    );
    ctx.emit(Event::GroupFallback {
        task_id: ctx.task_id,
        group_id: group_id.to_string(),
        members,
    });

    let mut sent = 0;
    for unit in units
        .iter_mut()
        .filter(|unit| unit.status() == UnitStatus::Downloaded)
    {
        match unit.upload(ctx).await {
            Ok(()) => sent += 1,
            Err(Error::Cancelled) => return TransferOutcome::Cancelled,
            Err(e) => {
                tracing::warn!(
                    task_id = ctx.task_id.0,
                    group_id,
                    message_id = unit.message_id(),
                    error = %e,
                    "group member upload failed"
                );
                unit.settle(&e);
                tally.upload_failures += 1;
            }
        }
        unit.cleanup().await;
    }

    if sent == 0 {
        return TransferOutcome::Failed {
            reason: grouped_error.user_message(),
        };
    }
    TransferOutcome::GroupDelivered {
        sent,
        download_failures: tally.download_failures,
        upload_failures: tally.upload_failures,
        fell_back: true,
    }
}
