//! Gallery merge and read-state operations.
//!
//! # Design
//! - Every mutation is a copy-on-write update executed through
//!   [`CollectionStore::modify`], so concurrent operations on the same gallery
//!   never work on a stale copy.
//! - Directory removal is best-effort: failures are logged and never undo a
//!   committed store change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use mangashelf_fsops::{FileSystem, resolve_within};
use mangashelf_store::{CollectionStore, KeyValueStore, Subscription};
use tracing::{info, warn};

use crate::error::{LibraryError, LibraryResult};
use crate::model::{Chapter, GALLERY_COLLECTION, Gallery, GalleryDraft, Manga};

/// Merge `incoming` into `existing`.
///
/// Every field of `existing` is kept; incoming chapters whose names are not
/// already present are appended in incoming order.
#[must_use]
pub fn merge_gallery(mut existing: Gallery, incoming: GalleryDraft) -> Gallery {
    let known: HashSet<String> = existing
        .chapters
        .iter()
        .map(|chapter| chapter.name.clone())
        .collect();
    existing.chapters.extend(
        incoming
            .chapters
            .into_iter()
            .filter(|chapter| !known.contains(&chapter.name)),
    );
    existing
}

/// Gallery collection plus the on-disk library it describes.
#[derive(Clone)]
pub struct GalleryLibrary {
    store: Arc<CollectionStore<Gallery>>,
    files: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl GalleryLibrary {
    /// Wrap an initialised gallery store.
    #[must_use]
    pub fn new(
        store: Arc<CollectionStore<Gallery>>,
        files: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            files,
            root: root.into(),
        }
    }

    /// Load the gallery collection from `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be loaded.
    pub async fn open(
        backend: Arc<dyn KeyValueStore>,
        files: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
    ) -> LibraryResult<Self> {
        let store = CollectionStore::open(GALLERY_COLLECTION, backend).await?;
        Ok(Self::new(Arc::new(store), files, root))
    }

    /// Underlying collection store.
    #[must_use]
    pub const fn store(&self) -> &Arc<CollectionStore<Gallery>> {
        &self.store
    }

    /// Filesystem used for directory management.
    #[must_use]
    pub fn files(&self) -> &Arc<dyn FileSystem> {
        &self.files
    }

    /// Directory holding every gallery.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the gallery stored under `gallery_path`.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::UnsafePath`] when the path is empty, made of
    /// `.`/`..` segments or absolute, so it never resolves to the library
    /// root or anything above it.
    pub fn gallery_dir(&self, gallery_path: &str) -> LibraryResult<PathBuf> {
        resolve_segment(&self.root, gallery_path)
    }

    /// Directory of one chapter.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::UnsafePath`] when either path would leave its
    /// parent directory.
    pub fn chapter_dir(&self, gallery_path: &str, chapter_path: &str) -> LibraryResult<PathBuf> {
        resolve_segment(&self.gallery_dir(gallery_path)?, chapter_path)
    }

    /// Current galleries in insertion order.
    #[must_use]
    pub fn galleries(&self) -> Arc<Vec<Gallery>> {
        self.store.get_collection()
    }

    /// Subscribe to gallery collection changes.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<Gallery> {
        self.store.subscribe()
    }

    /// Gallery with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::GalleryNotFound`] for an unknown id.
    pub fn get(&self, id: u64) -> LibraryResult<Gallery> {
        self.store
            .get(id)
            .ok_or(LibraryError::GalleryNotFound { id })
    }

    /// Gallery with the given display name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Gallery> {
        self.store.find(|gallery| gallery.name == name)
    }

    /// Add `draft` as a new gallery, or merge its new chapters into the
    /// gallery with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub async fn upsert(&self, draft: GalleryDraft) -> LibraryResult<Gallery> {
        let name = draft.name.clone();
        let gallery = self
            .store
            .upsert_where(|gallery| gallery.name == name, draft, merge_gallery)
            .await?;
        info!(gallery_id = gallery.id, gallery = %gallery.name, chapters = gallery.chapters.len(), "gallery upserted");
        Ok(gallery)
    }

    /// Mark the chapter at `index` as read and stamp the last-read time.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::ChapterIndexOutOfRange`] for a bad index, or a
    /// lookup/persistence error.
    pub async fn mark_chapter_read(&self, id: u64, index: usize) -> LibraryResult<Gallery> {
        self.store
            .modify(id, |mut gallery| -> LibraryResult<Gallery> {
                let len = gallery.chapters.len();
                let chapter = gallery.chapters.get_mut(index).ok_or(
                    LibraryError::ChapterIndexOutOfRange {
                        gallery_id: id,
                        index,
                        len,
                    },
                )?;
                chapter.read = true;
                gallery.last_read_at = Some(Utc::now());
                Ok(gallery)
            })
            .await
    }

    /// Mark every chapter named in `names` as read and stamp the last-read
    /// time. Unknown names are ignored.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error.
    pub async fn bulk_mark_read(&self, id: u64, names: &[String]) -> LibraryResult<Gallery> {
        let names: HashSet<&str> = names.iter().map(String::as_str).collect();
        self.store
            .modify(id, |mut gallery| {
                for chapter in &mut gallery.chapters {
                    chapter.read = chapter.read || names.contains(chapter.name.as_str());
                }
                gallery.last_read_at = Some(Utc::now());
                Ok::<_, LibraryError>(gallery)
            })
            .await
    }

    /// Remove every chapter named in `names` and delete their directories.
    /// The last-read time is left alone.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error. Directory deletion failures are
    /// only logged.
    pub async fn bulk_delete(&self, id: u64, names: &[String]) -> LibraryResult<Gallery> {
        let names: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut removed = Vec::new();
        let gallery = self
            .store
            .modify(id, |mut gallery| {
                let (dropped, kept): (Vec<Chapter>, Vec<Chapter>) = gallery
                    .chapters
                    .into_iter()
                    .partition(|chapter| names.contains(chapter.name.as_str()));
                gallery.chapters = kept;
                removed = dropped;
                Ok::<_, LibraryError>(gallery)
            })
            .await?;

        for chapter in &removed {
            let dir = match self.chapter_dir(&gallery.path, &chapter.path) {
                Ok(dir) => dir,
                Err(err) => {
                    warn!(gallery_id = id, chapter = %chapter.name, error = %err, "chapter directory skipped");
                    continue;
                }
            };
            if let Err(err) = self.files.delete(&dir).await {
                warn!(gallery_id = id, path = %dir.display(), error = %err, "chapter directory not removed");
            }
        }
        Ok(gallery)
    }

    /// Stamp the last-read time.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error.
    pub async fn update_last_read_at(&self, id: u64) -> LibraryResult<Gallery> {
        self.store
            .modify(id, |mut gallery| {
                gallery.last_read_at = Some(Utc::now());
                Ok::<_, LibraryError>(gallery)
            })
            .await
    }

    /// Record the resume position inside a chapter.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::ChapterNotFound`] or
    /// [`LibraryError::PageOutOfRange`] for bad coordinates, or a lookup or
    /// persistence error.
    pub async fn update_current_page(
        &self,
        id: u64,
        chapter_name: &str,
        page: usize,
    ) -> LibraryResult<Gallery> {
        self.store
            .modify(id, |mut gallery| -> LibraryResult<Gallery> {
                let chapter = gallery
                    .chapters
                    .iter_mut()
                    .find(|chapter| chapter.name == chapter_name)
                    .ok_or_else(|| LibraryError::ChapterNotFound {
                        gallery_id: id,
                        name: chapter_name.to_string(),
                    })?;
                if page >= chapter.pages.len() {
                    return Err(LibraryError::PageOutOfRange {
                        gallery_id: id,
                        chapter: chapter_name.to_string(),
                        page,
                        len: chapter.pages.len(),
                    });
                }
                chapter.current_page = page;
                Ok(gallery)
            })
            .await
    }

    /// Remove a gallery and delete its directory tree.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error. Directory deletion failures are
    /// only logged.
    pub async fn delete_gallery(&self, id: u64) -> LibraryResult<Gallery> {
        let gallery = self.store.remove_item(id).await?;
        match self.gallery_dir(&gallery.path) {
            Ok(dir) => {
                if let Err(err) = self.files.delete(&dir).await {
                    warn!(gallery_id = id, path = %dir.display(), error = %err, "gallery directory not removed");
                }
            }
            Err(err) => {
                warn!(gallery_id = id, gallery = %gallery.name, error = %err, "gallery directory skipped");
            }
        }
        info!(gallery_id = id, gallery = %gallery.name, "gallery deleted");
        Ok(gallery)
    }

    /// Attach metadata to a gallery.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error.
    pub async fn set_manga(&self, id: u64, manga: Manga) -> LibraryResult<Gallery> {
        self.store
            .modify(id, |mut gallery| {
                gallery.manga = Some(manga);
                Ok::<_, LibraryError>(gallery)
            })
            .await
    }

    /// Detach metadata from a gallery.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error.
    pub async fn clear_manga(&self, id: u64) -> LibraryResult<Gallery> {
        self.store
            .modify(id, |mut gallery| {
                gallery.manga = None;
                Ok::<_, LibraryError>(gallery)
            })
            .await
    }

    /// Set or clear the manual filter flag.
    ///
    /// # Errors
    ///
    /// Returns a lookup or persistence error.
    pub async fn set_filtered(&self, id: u64, filtered: bool) -> LibraryResult<Gallery> {
        self.store
            .modify(id, |mut gallery| {
                gallery.filtered = Some(filtered);
                Ok::<_, LibraryError>(gallery)
            })
            .await
    }
}

fn resolve_segment(parent: &Path, segment: &str) -> LibraryResult<PathBuf> {
    resolve_within(parent, segment).map_err(|source| LibraryError::UnsafePath {
        path: segment.to_string(),
        source,
    })
}
