//! # Design
//!
//! - Constant messages; the offending field and value travel in fields.

use mangashelf_store::KvError;
use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading configuration or touching settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held an unusable value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Variable name.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Persisted settings could not be read or written.
    #[error("settings store operation failed")]
    Store {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying backend error.
        source: KvError,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: &str, reason: &'static str) -> Self {
        Self::InvalidField {
            field,
            value: Some(value.to_string()),
            reason,
        }
    }
}
