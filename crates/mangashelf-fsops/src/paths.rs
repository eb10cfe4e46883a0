//! Relative path sanitising for paths received from remote listings.

use std::path::{Component, Path, PathBuf};

use crate::error::{FsOpsError, FsOpsResult};

/// Join `relative` onto `root`, rejecting absolute paths and parent
/// traversal so remote input can never escape the library root.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] for absolute paths, `..` segments or
/// an empty path.
pub fn resolve_within(root: &Path, relative: &str) -> FsOpsResult<PathBuf> {
    let path = Path::new(relative);
    if path.is_absolute() {
        return Err(FsOpsError::InvalidInput {
            field: "relative_path",
            reason: "absolute_path",
            value: Some(relative.to_string()),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(FsOpsError::InvalidInput {
                    field: "relative_path",
                    reason: "invalid_segment",
                    value: Some(relative.to_string()),
                });
            }
        }
    }

    if sanitized.as_os_str().is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "relative_path",
            reason: "empty",
            value: None,
        });
    }
    Ok(root.join(sanitized))
}
