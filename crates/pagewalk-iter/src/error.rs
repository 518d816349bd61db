//! Error types for page iteration.

use pagewalk_core::BoxError;

use crate::IterationState;

/// Result type for iteration operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure of a single fetch or consumer step.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid iteration parameters.
    #[error("Invalid iteration configuration: {0}")]
    Config(String),

    /// The store failed to resolve the cursor or return a page.
    #[error("Page fetch failed: {0}")]
    Fetch(#[from] pagewalk_core::Error),

    /// A page or entity consumer returned an error that was not handled.
    #[error("Consumer failed: {0}")]
    Consumer(BoxError),
}

impl Error {
    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }
}

/// Iteration run that ended in the `Failed` state.
///
/// Carries the progress recorded before the failing step so the caller can
/// persist [`last_processed_id`](Self::last_processed_id) and resume later.
/// The page whose consumer failed is counted as processed, matching the
/// cursor that was already advanced past it.
#[derive(Debug, thiserror::Error)]
#[error("Iteration failed after {total_number_of_results} entities: {source}")]
pub struct IterationError {
    total_number_of_results: u64,
    last_processed_id: Option<String>,
    #[source]
    source: Error,
}

impl IterationError {
    pub(crate) fn new(
        total_number_of_results: u64,
        last_processed_id: Option<String>,
        source: Error,
    ) -> Self {
        Self {
            total_number_of_results,
            last_processed_id,
            source,
        }
    }

    /// Entities handed to the consumer before the failure.
    pub fn total_number_of_results(&self) -> u64 {
        self.total_number_of_results
    }

    /// Cursor recorded before the failure.
    pub fn last_processed_id(&self) -> Option<&str> {
        self.last_processed_id.as_deref()
    }

    /// Always [`IterationState::Failed`].
    pub fn state(&self) -> IterationState {
        IterationState::Failed
    }

    /// Returns the underlying step error.
    pub fn error(&self) -> &Error {
        &self.source
    }

    /// Consumes the failure and returns the underlying step error.
    pub fn into_error(self) -> Error {
        self.source
    }
}
