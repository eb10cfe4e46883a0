//! # Design
//!
//! - Constant-message errors; gallery names, urls and statuses travel in
//!   fields.
//! - Library and filesystem failures keep their source error.

use mangashelf_fsops::FsOpsError;
use mangashelf_library::LibraryError;
use thiserror::Error;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors produced by the download pipeline and the background queue.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Directory setup or a transfer failed at the filesystem layer.
    #[error("download filesystem operation failed")]
    Fs {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying filesystem error.
        source: FsOpsError,
    },
    /// The gallery record could not be written.
    #[error("gallery update failed")]
    Library {
        /// Underlying library error.
        source: LibraryError,
    },
    /// A batch kept failing until the retry budget ran out.
    #[error("transfer retries exhausted")]
    RetriesExhausted {
        /// Gallery being downloaded.
        gallery: String,
        /// Attempts made for the failing batch.
        attempts: usize,
    },
    /// A single transfer answered with a non-success status.
    #[error("transfer returned a failure status")]
    TransferStatus {
        /// Requested URL.
        url: String,
        /// HTTP status received.
        status: u16,
    },
    /// The stop signal fired before the run finished.
    #[error("download cancelled")]
    Cancelled {
        /// Gallery being downloaded.
        gallery: String,
    },
    /// Another run for the same gallery has not finished yet.
    #[error("download already in progress")]
    AlreadyInProgress {
        /// Gallery being downloaded.
        gallery: String,
    },
    /// The persisted queue could not be read or written.
    #[error("download queue query failed")]
    Queue {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying database error.
        source: sqlx::Error,
    },
    /// Pipeline or queue options were rejected.
    #[error("invalid download options")]
    InvalidOptions {
        /// Offending option.
        field: &'static str,
        /// Static reason for the rejection.
        reason: &'static str,
    },
}

impl DownloadError {
    pub(crate) const fn fs(operation: &'static str, source: FsOpsError) -> Self {
        Self::Fs { operation, source }
    }

    pub(crate) const fn queue(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Queue { operation, source }
    }
}

impl From<LibraryError> for DownloadError {
    fn from(source: LibraryError) -> Self {
        Self::Library { source }
    }
}
