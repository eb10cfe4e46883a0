#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![allow(clippy::redundant_pub_crate)]

//! Filesystem contract used by the library and the downloaders.
//!
//! Layout: `local.rs` (tokio filesystem + HTTP transfers), `paths.rs`
//! (relative path sanitising), `error.rs`.

pub mod error;
pub mod local;
pub mod paths;

use std::path::Path;

use async_trait::async_trait;

pub use error::{FsOpsError, FsOpsResult};
pub use local::LocalFileSystem;
pub use paths::resolve_within;

/// Storage operations the library depends on.
///
/// `download` reports the HTTP status instead of failing on non-success
/// codes so callers can drive their own retry policy.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether `path` exists.
    async fn exists(&self, path: &Path) -> FsOpsResult<bool>;

    /// Create a directory, optionally with missing parents. Creating an
    /// existing directory is not an error.
    async fn make_directory(&self, path: &Path, intermediates: bool) -> FsOpsResult<()>;

    /// Fetch `url` into `destination` and return the response status. The
    /// destination is only written for success statuses.
    async fn download(&self, url: &str, destination: &Path) -> FsOpsResult<u16>;

    /// Delete a file or a directory tree. Deleting a missing path is not an
    /// error.
    async fn delete(&self, path: &Path) -> FsOpsResult<()>;
}
