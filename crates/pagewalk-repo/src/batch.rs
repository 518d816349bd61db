//! Chunked concurrent batch writes.

use std::future::Future;

use futures::future::join_all;
use pagewalk_core::{Operation, SharedHook};

use crate::{Error, Result, TRACING_TARGET_BATCH};

/// Splits `items` into groups of at most `group_size` entries, preserving order.
pub(crate) fn split_groups<T>(items: Vec<T>, group_size: usize) -> Vec<Vec<T>> {
    let group_size = group_size.max(1);
    let mut groups = Vec::with_capacity(items.len().div_ceil(group_size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        groups.push(items.by_ref().take(group_size).collect());
    }
    groups
}

/// Writes `items` in groups, all groups in flight at once.
///
/// Each committed group is reported to `hook` as `operation` with the group
/// length. Returns the number of committed items, or
/// [`Error::PartialBatch`] with the first group failure when any group failed.
#[tracing::instrument(
    skip(items, hook, write),
    fields(total = items.len()),
    target = TRACING_TARGET_BATCH
)]
pub(crate) async fn write_groups<T, F, Fut>(
    name: &'static str,
    operation: Operation,
    items: Vec<T>,
    group_size: usize,
    hook: &SharedHook,
    write: F,
) -> Result<usize>
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = pagewalk_core::Result<()>>,
{
    let total = items.len();
    let groups = split_groups(items, group_size);
    let group_count = groups.len();

    let outcomes = join_all(groups.into_iter().map(|group| {
        let len = group.len();
        let pending = write(group);
        async move { (len, pending.await) }
    }))
    .await;

    let mut committed = 0;
    let mut failed_groups = 0;
    let mut first_error = None;

    for (index, (len, outcome)) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(()) => {
                committed += len;
                hook.record(operation, len as u64);
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET_BATCH,
                    group = index,
                    size = len,
                    error = %error,
                    "Batch group failed"
                );
                failed_groups += 1;
                first_error.get_or_insert(error);
            }
        }
    }

    match first_error {
        None => {
            tracing::debug!(
                target: TRACING_TARGET_BATCH,
                committed,
                groups = group_count,
                "Batch committed"
            );
            Ok(committed)
        }
        Some(source) => Err(Error::PartialBatch {
            operation: name,
            committed,
            total,
            failed_groups,
            source,
        }),
    }
}
