#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging.

/// Tracing target for single-record operations.
///
/// Use this target for logging creates, updates and deletes of one entity.
pub const TRACING_TARGET_REPOSITORY: &str = "pagewalk_repo::repository";

/// Tracing target for chunked batch writes.
///
/// Use this target for logging group splits, committed counts and failed groups.
pub const TRACING_TARGET_BATCH: &str = "pagewalk_repo::batch";

/// Tracing target for retries of optimistic updates.
pub const TRACING_TARGET_RETRY: &str = "pagewalk_repo::retry";

mod batch;
mod error;
mod repository;
mod retry;

pub use error::{Error, Result};
pub use pagewalk_core::{DocumentStore, Entity};
pub use pagewalk_iter::EntityPager;
pub use repository::{NewEntity, Repository};
pub use retry::RetryConfig;
