//! # Design
//!
//! - Constant error messages; context (operation, key, collection) lives in fields.
//! - Backend failures keep their source so callers can inspect the cause.

use thiserror::Error;

/// Result alias for key-value backend operations.
pub type KvResult<T> = Result<T, KvError>;

/// Result alias for collection store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`crate::KeyValueStore`] backend.
#[derive(Debug, Error)]
pub enum KvError {
    /// A database statement failed.
    #[error("key-value query failed")]
    Query {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// The backend refused the operation.
    #[error("key-value backend unavailable")]
    Unavailable {
        /// Operation identifier.
        operation: &'static str,
        /// Static reason for the refusal.
        reason: &'static str,
    },
}

impl KvError {
    pub(crate) const fn query(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Query { operation, source }
    }
}

/// Errors raised by [`crate::CollectionStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Persisting or loading a record failed.
    #[error("collection persistence failed")]
    Backend {
        /// Operation identifier.
        operation: &'static str,
        /// Collection name.
        collection: String,
        /// Underlying backend error.
        source: KvError,
    },
    /// A record could not be encoded.
    #[error("collection record serialization failed")]
    Serialize {
        /// Operation identifier.
        operation: &'static str,
        /// Storage key of the record.
        key: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// No entity with the requested id exists.
    #[error("collection entity not found")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Requested identifier.
        id: u64,
    },
}
