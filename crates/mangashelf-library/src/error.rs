//! Error types for gallery operations.

use mangashelf_fsops::FsOpsError;
use mangashelf_store::StoreError;
use thiserror::Error;

/// Result alias for gallery operations.
pub type LibraryResult<T> = Result<T, LibraryError>;

/// Errors raised by [`crate::GalleryLibrary`].
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The gallery collection could not be read or written.
    #[error("gallery store operation failed")]
    Store {
        /// Underlying store error.
        source: StoreError,
    },
    /// No gallery has the requested id.
    #[error("gallery not found")]
    GalleryNotFound {
        /// Requested gallery id.
        id: u64,
    },
    /// No chapter has the requested name.
    #[error("chapter not found")]
    ChapterNotFound {
        /// Gallery that was searched.
        gallery_id: u64,
        /// Requested chapter name.
        name: String,
    },
    /// A chapter index was outside the gallery's chapter list.
    #[error("chapter index out of range")]
    ChapterIndexOutOfRange {
        /// Gallery that was addressed.
        gallery_id: u64,
        /// Requested index.
        index: usize,
        /// Number of chapters in the gallery.
        len: usize,
    },
    /// A page index was outside the chapter's page list.
    #[error("page index out of range")]
    PageOutOfRange {
        /// Gallery that was addressed.
        gallery_id: u64,
        /// Chapter that was addressed.
        chapter: String,
        /// Requested page.
        page: usize,
        /// Number of pages in the chapter.
        len: usize,
    },
    /// A stored gallery or chapter path does not name a directory inside the
    /// library root.
    #[error("gallery path escapes the library root")]
    UnsafePath {
        /// Offending path segment.
        path: String,
        /// Rejection from the path resolver.
        source: FsOpsError,
    },
}

impl From<StoreError> for LibraryError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::NotFound { id, .. } => Self::GalleryNotFound { id },
            other => Self::Store { source: other },
        }
    }
}
