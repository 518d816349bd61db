//! Operation accounting hook.
//!
//! Every read, write and delete issued through the fetcher or the CRUD layer
//! is reported to an [`OperationHook`] with the number of entities involved.
//! Hosted document stores usually bill per entity touched; the hook is the
//! single place to track that cost.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::TRACING_TARGET_ACCOUNTING;

/// Kind of billable store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// Entities read by a query or lookup.
    Read,
    /// Entities created or updated.
    Write,
    /// Entities deleted.
    Delete,
}

/// Callback receiving operation counts.
///
/// Any `Fn(Operation, u64)` closure that is `Send + Sync` implements this trait.
pub trait OperationHook: Send + Sync {
    /// Records `count` entities touched by `operation`.
    fn record(&self, operation: Operation, count: u64);
}

impl<F> OperationHook for F
where
    F: Fn(Operation, u64) + Send + Sync,
{
    fn record(&self, operation: Operation, count: u64) {
        self(operation, count)
    }
}

/// Shared, type-erased hook handle.
pub type SharedHook = Arc<dyn OperationHook>;

/// Hook that discards every report. Used when no hook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

impl NoopHook {
    /// Returns the no-op hook as a shared handle.
    pub fn shared() -> SharedHook {
        Arc::new(Self)
    }
}

impl OperationHook for NoopHook {
    fn record(&self, _operation: Operation, _count: u64) {}
}

/// Snapshot of the counters held by an [`OperationCounter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounts {
    /// Total entities read.
    pub reads: u64,
    /// Total entities written.
    pub writes: u64,
    /// Total entities deleted.
    pub deletes: u64,
}

/// Thread-safe running tally of reported operations.
#[derive(Debug, Default)]
pub struct OperationCounter {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl OperationCounter {
    /// Creates a counter with all tallies at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current tallies.
    pub fn snapshot(&self) -> OperationCounts {
        OperationCounts {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Resets all tallies to zero and returns the values they held.
    pub fn reset(&self) -> OperationCounts {
        OperationCounts {
            reads: self.reads.swap(0, Ordering::Relaxed),
            writes: self.writes.swap(0, Ordering::Relaxed),
            deletes: self.deletes.swap(0, Ordering::Relaxed),
        }
    }
}

impl OperationHook for OperationCounter {
    fn record(&self, operation: Operation, count: u64) {
        let counter = match operation {
            Operation::Read => &self.reads,
            Operation::Write => &self.writes,
            Operation::Delete => &self.deletes,
        };
        counter.fetch_add(count, Ordering::Relaxed);

        tracing::trace!(
            target: TRACING_TARGET_ACCOUNTING,
            operation = %operation,
            count,
            "Recorded store operation"
        );
    }
}
