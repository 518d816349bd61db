#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging.

/// Tracing target for document store operations.
///
/// Use this target for logging queries, lookups and batched writes against a store.
pub const TRACING_TARGET_STORE: &str = "pagewalk_core::store";

/// Tracing target for operation accounting.
///
/// Use this target for logging read/write/delete counts reported to an [`OperationHook`].
pub const TRACING_TARGET_ACCOUNTING: &str = "pagewalk_core::accounting";

mod accounting;
mod entity;
mod error;
pub mod memory;
pub mod query;
mod store;

pub use accounting::{
    NoopHook, Operation, OperationCounter, OperationCounts, OperationHook, SharedHook,
};
pub use entity::Entity;
pub use error::{BoxError, Error, Result};
pub use memory::MemoryStore;
pub use query::{Comparison, Direction, Predicate, SortKey, StoreQuery};
pub use store::{DocumentStore, MAX_BATCH_SIZE};
