//! In-memory [`FileSystem`] with scripted transfer outcomes.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mangashelf_fsops::{FileSystem, FsOpsError, FsOpsResult};
use tokio::sync::Semaphore;

/// Result of one scripted transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Respond with the given HTTP status.
    Status(u16),
    /// Fail at the transport level.
    Error,
}

#[derive(Default)]
struct State {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, String>,
    scripts: HashMap<String, VecDeque<Transfer>>,
    attempts: Vec<String>,
    deleted: Vec<PathBuf>,
    failing_deletes: BTreeSet<PathBuf>,
}

/// Filesystem double that keeps directories and files in memory.
///
/// Transfers succeed with status 200 unless a script was queued for the URL.
#[derive(Clone, Default)]
pub struct ScriptedFileSystem {
    state: Arc<Mutex<State>>,
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl ScriptedFileSystem {
    /// Empty filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next attempts at `url`.
    pub fn script(&self, url: &str, outcomes: impl IntoIterator<Item = Transfer>) {
        self.lock()
            .scripts
            .entry(url.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Make deleting `path` fail.
    pub fn fail_delete(&self, path: impl Into<PathBuf>) {
        self.lock().failing_deletes.insert(path.into());
    }

    /// Hold every transfer until the returned semaphore gains permits or is
    /// closed.
    #[must_use]
    pub fn hold_transfers(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = Some(gate.clone());
        gate
    }

    /// Seed an existing directory.
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.lock().dirs.insert(path.into());
    }

    /// URLs requested so far, in request order.
    #[must_use]
    pub fn attempts(&self) -> Vec<String> {
        self.lock().attempts.clone()
    }

    /// Number of attempts made against `url`.
    #[must_use]
    pub fn attempts_for(&self, url: &str) -> usize {
        self.lock().attempts.iter().filter(|u| *u == url).count()
    }

    /// Existing directories.
    #[must_use]
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.lock().dirs.iter().cloned().collect()
    }

    /// Written files mapped to the URL they were fetched from.
    #[must_use]
    pub fn files(&self) -> BTreeMap<PathBuf, String> {
        self.lock().files.clone()
    }

    /// Paths passed to `delete`, in call order.
    #[must_use]
    pub fn deleted(&self) -> Vec<PathBuf> {
        self.lock().deleted.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FileSystem for ScriptedFileSystem {
    async fn exists(&self, path: &Path) -> FsOpsResult<bool> {
        let state = self.lock();
        Ok(state.dirs.contains(path) || state.files.contains_key(path))
    }

    async fn make_directory(&self, path: &Path, intermediates: bool) -> FsOpsResult<()> {
        let mut state = self.lock();
        if intermediates {
            for ancestor in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
                state.dirs.insert(ancestor.to_path_buf());
            }
        } else {
            state.dirs.insert(path.to_path_buf());
        }
        Ok(())
    }

    async fn download(&self, url: &str, destination: &Path) -> FsOpsResult<u16> {
        let gate = self
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(gate) = gate {
            self.lock().attempts.push(url.to_string());
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        } else {
            self.lock().attempts.push(url.to_string());
        }

        let mut state = self.lock();
        let outcome = state
            .scripts
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Transfer::Status(200));
        match outcome {
            Transfer::Status(status) => {
                if (200..300).contains(&status) {
                    state
                        .files
                        .insert(destination.to_path_buf(), url.to_string());
                }
                Ok(status)
            }
            Transfer::Error => Err(FsOpsError::Io {
                operation: "download",
                path: destination.to_path_buf(),
                source: io::Error::new(io::ErrorKind::ConnectionReset, "scripted transfer error"),
            }),
        }
    }

    async fn delete(&self, path: &Path) -> FsOpsResult<()> {
        let mut state = self.lock();
        state.deleted.push(path.to_path_buf());
        if state.failing_deletes.contains(path) {
            return Err(FsOpsError::Io {
                operation: "delete",
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "scripted delete error"),
            });
        }
        state.dirs.retain(|dir| !dir.starts_with(path));
        state.files.retain(|file, _| !file.starts_with(path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_statuses_are_consumed_in_order() -> anyhow::Result<()> {
        let fs = ScriptedFileSystem::new();
        fs.script("http://x/a", [Transfer::Status(500), Transfer::Error]);

        assert_eq!(fs.download("http://x/a", Path::new("/a")).await?, 500);
        assert!(fs.download("http://x/a", Path::new("/a")).await.is_err());
        assert_eq!(fs.download("http://x/a", Path::new("/a")).await?, 200);
        assert_eq!(fs.attempts_for("http://x/a"), 3);
        assert_eq!(fs.files().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_descendants() -> anyhow::Result<()> {
        let fs = ScriptedFileSystem::new();
        fs.make_directory(Path::new("/lib/g/c1"), true).await?;
        fs.make_directory(Path::new("/lib/g/c2"), true).await?;

        fs.delete(Path::new("/lib/g/c1")).await?;

        assert!(!fs.exists(Path::new("/lib/g/c1")).await?);
        assert!(fs.exists(Path::new("/lib/g/c2")).await?);
        assert_eq!(fs.deleted(), vec![PathBuf::from("/lib/g/c1")]);
        Ok(())
    }
}
