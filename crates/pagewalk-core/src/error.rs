//! Error types for document store operations.

/// Type-erased error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for all store operations in this crate.
///
/// This is a convenience type alias that defaults to using [`Error`] as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for document store operations.
#[derive(Debug, thiserror::Error)]
#[must_use = "store errors should be handled appropriately"]
pub enum Error {
    /// The request was malformed (zero page size, empty id, ...).
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A referenced entity does not exist.
    #[error("Entity '{id}' not found")]
    NotFound { id: String },

    /// An entity with the same id already exists.
    #[error("Entity '{id}' already exists")]
    AlreadyExists { id: String },

    /// A conditional write lost against a concurrent writer.
    #[error("Conflicting update on entity '{id}' after {attempts} attempt(s)")]
    Conflict { id: String, attempts: u32 },

    /// The underlying store failed (network, permission, malformed query).
    #[error("Store operation '{operation}' failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an already exists error.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Create a conflict error.
    pub fn conflict(id: impl Into<String>, attempts: u32) -> Self {
        Self::Conflict {
            id: id.into(),
            attempts,
        }
    }

    /// Wrap a backend failure for the named operation.
    pub fn store(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Store {
            operation,
            source: source.into(),
        }
    }

    /// Returns whether retrying the same call could succeed.
    ///
    /// Only backend failures and lost conditional writes are considered transient;
    /// malformed requests and missing entities are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store { .. } | Error::Conflict { .. })
    }
}
