//! Iteration configuration
//!
//! This module provides the configuration and builder for a single iteration run.

use std::num::NonZeroUsize;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::QueryDescriptor;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Configuration of one iteration run.
///
/// Holds the query to walk, the page size, the optional cursor to resume
/// after and, for per-entity consumers, the bound on concurrently processed
/// entities of a page.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    name = "IterationConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct IterationConfig {
    /// Filters and ordering of the walk.
    #[builder(default)]
    #[serde(default)]
    pub query: QueryDescriptor,
    /// Maximum number of entities per page.
    #[builder(default = "DEFAULT_PAGE_SIZE")]
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Id of the entity to resume strictly after.
    #[builder(default)]
    #[serde(default)]
    pub start_after: Option<String>,
    /// Maximum entities of a page processed at once by a per-entity consumer.
    #[builder(setter(custom), default)]
    #[serde(default)]
    pub max_concurrency: Option<NonZeroUsize>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self::new(QueryDescriptor::default())
    }
}

impl IterationConfig {
    /// Create a new configuration builder
    pub fn builder() -> IterationConfigBuilder {
        IterationConfigBuilder::default()
    }

    /// Creates a configuration walking `query` from the beginning with the default page size.
    pub fn new(query: QueryDescriptor) -> Self {
        Self {
            query,
            page_size: DEFAULT_PAGE_SIZE,
            start_after: None,
            max_concurrency: None,
        }
    }

    /// Returns the configuration resumed after `cursor`.
    ///
    /// Pass the `last_processed_id` of a previous run to continue where it stopped.
    pub fn resume_after(mut self, cursor: Option<String>) -> Self {
        self.start_after = cursor;
        self
    }
}

impl IterationConfigBuilder {
    /// Bounds concurrently processed entities; `0` removes the bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(NonZeroUsize::new(max_concurrency));
        self
    }

    /// Sets or clears the cursor to resume after.
    pub fn with_cursor(mut self, cursor: Option<impl Into<String>>) -> Self {
        self.start_after = Some(cursor.map(Into::into));
        self
    }

    fn validate_config(&self) -> Result<(), String> {
        if let Some(0) = self.page_size {
            return Err("Page size must be greater than 0".to_string());
        }

        if let Some(Some(cursor)) = &self.start_after {
            if cursor.is_empty() {
                return Err("Start cursor must not be empty".to_string());
            }
        }

        Ok(())
    }
}
