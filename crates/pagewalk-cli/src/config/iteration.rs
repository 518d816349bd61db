//! Iteration configuration: paging, resumption and fan-out.

use anyhow::{Result as AnyhowResult, anyhow};
use clap::Args;
use pagewalk_iter::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Iteration configuration.
///
/// # Environment Variables
///
/// - `PAGEWALK_PAGE_SIZE` - Entities per page (default: 500)
/// - `PAGEWALK_START_AFTER` - Id to resume strictly after
/// - `PAGEWALK_MAX_CONCURRENCY` - Entities processed at once, 0 for the whole page
/// - `PAGEWALK_LIMIT` - Stop after this many entities
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
#[must_use = "config does nothing unless you use it"]
pub struct IterationArgs {
    /// Maximum number of entities fetched per page.
    #[arg(long, env = "PAGEWALK_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Resume strictly after the entity with this id.
    ///
    /// Pass the last processed id reported by a previous run.
    #[arg(long, env = "PAGEWALK_START_AFTER")]
    pub start_after: Option<String>,

    /// Maximum entities of a page processed at once; 0 means the whole page.
    #[arg(long, env = "PAGEWALK_MAX_CONCURRENCY", default_value_t = 0)]
    pub max_concurrency: usize,

    /// Stop after emitting this many entities.
    ///
    /// The walk ends after the page containing the last emitted entity.
    #[arg(long, env = "PAGEWALK_LIMIT")]
    pub limit: Option<u64>,
}

impl Default for IterationArgs {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            start_after: None,
            max_concurrency: 0,
            limit: None,
        }
    }
}

impl IterationArgs {
    /// Validates all configuration values.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.page_size == 0 {
            return Err(anyhow!("Page size must be greater than 0"));
        }

        if self.start_after.as_deref() == Some("") {
            return Err(anyhow!("Start cursor must not be empty"));
        }

        if self.limit == Some(0) {
            return Err(anyhow!("Limit must be greater than 0"));
        }

        Ok(())
    }

    /// Logs the iteration configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            page_size = self.page_size,
            start_after = ?self.start_after,
            max_concurrency = self.max_concurrency,
            limit = ?self.limit,
            "Iteration configuration"
        );
    }
}
