//! # Design
//!
//! - Constant messages; urls, statuses and service messages live in fields.
//! - Transport errors keep the `reqwest` source.

use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised by the Local API and metadata clients.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A configured URL could not be parsed.
    #[error("invalid remote url")]
    InvalidUrl {
        /// Offending value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// The request could not be sent or its body could not be read.
    #[error("remote request failed")]
    Request {
        /// Operation that failed.
        operation: &'static str,
        /// Requested URL.
        url: String,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The server answered with a non-success status.
    #[error("remote returned a failure status")]
    Status {
        /// Operation that failed.
        operation: &'static str,
        /// Requested URL.
        url: String,
        /// HTTP status received.
        status: u16,
    },
    /// The metadata service reported query errors.
    #[error("metadata query rejected")]
    Query {
        /// Messages returned by the service.
        messages: Vec<String>,
    },
}

impl RemoteError {
    pub(crate) fn request(operation: &'static str, url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            operation,
            url: url.to_string(),
            source,
        }
    }
}
