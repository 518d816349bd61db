#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

// Tracing target constants for consistent logging.

/// Tracing target for page fetches.
///
/// Use this target for logging cursor resolution, fetched page sizes and fetch errors.
pub const TRACING_TARGET_FETCHER: &str = "pagewalk_iter::fetcher";

/// Tracing target for the sequential page driver.
///
/// Use this target for logging iteration progress and terminal states.
pub const TRACING_TARGET_DRIVER: &str = "pagewalk_iter::driver";

/// Tracing target for per-entity fan-out.
///
/// Use this target for logging handled and propagated entity failures.
pub const TRACING_TARGET_FANOUT: &str = "pagewalk_iter::fanout";

mod config;
mod consumer;
mod descriptor;
mod driver;
mod error;
mod fanout;
mod fetcher;
mod page;

pub use config::{DEFAULT_PAGE_SIZE, IterationConfig, IterationConfigBuilder};
pub use consumer::{
    ConsumerResult, EntityConsumer, ErrorDecision, ErrorHandler, FailFast, Flow, PageConsumer,
};
pub use descriptor::QueryDescriptor;
pub use driver::{EntityPager, IterationResult, IterationState};
pub use error::{Error, IterationError, Result};
pub use fanout::FanOut;
pub use fetcher::PagedFetcher;
pub use page::Page;
