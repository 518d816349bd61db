//! Error types for repository operations.

/// Result type for repository operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by [`Repository`](crate::Repository).
#[derive(Debug, thiserror::Error)]
#[must_use = "repository errors should be handled appropriately"]
pub enum Error {
    /// A single store call failed.
    #[error(transparent)]
    Store(#[from] pagewalk_core::Error),

    /// Some groups of a batched write failed while others were committed.
    ///
    /// Groups are independent; committed groups are not rolled back.
    #[error(
        "Batch {operation} committed {committed} of {total} entities, {failed_groups} group(s) failed: {source}"
    )]
    PartialBatch {
        operation: &'static str,
        committed: usize,
        total: usize,
        failed_groups: usize,
        #[source]
        source: pagewalk_core::Error,
    },
}

impl Error {
    /// Returns whether retrying the same call could succeed.
    ///
    /// Partial batches are never retried as a whole since some groups are
    /// already committed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(error) => error.is_retryable(),
            Self::PartialBatch { .. } => false,
        }
    }

    /// Returns the underlying store error.
    pub fn store_error(&self) -> &pagewalk_core::Error {
        match self {
            Self::Store(error) => error,
            Self::PartialBatch { source, .. } => source,
        }
    }
}
