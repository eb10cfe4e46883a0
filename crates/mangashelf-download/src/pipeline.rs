//! Batched, retrying gallery downloads.
//!
//! # Design
//! - A run plans the gallery from the listing, creates the missing chapter
//!   directories, transfers pages in fixed-size concurrent batches and only
//!   then records the gallery through [`GalleryLibrary::upsert`].
//! - A failed batch is retried as a whole until the retry budget runs out;
//!   the budget resets after every successful batch.
//! - Any failure removes the chapter directories the run created.
//! - At most one run per gallery name is in flight.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use mangashelf_events::{Event, EventBus};
use mangashelf_fsops::resolve_within;
use mangashelf_library::{Gallery, GalleryDraft, GalleryLibrary, LocalApiData};
use mangashelf_telemetry::Metrics;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::control::StopSignal;
use crate::error::{DownloadError, DownloadResult};

/// Pages transferred concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;
/// Attempts allowed per batch before the run fails.
pub const DEFAULT_RETRY_BUDGET: usize = 3;

/// Tunables for [`DownloadPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Pages transferred concurrently per batch.
    pub batch_size: usize,
    /// Attempts allowed per batch.
    pub retry_budget: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl PipelineOptions {
    /// Reject zero batch sizes and budgets.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidOptions`] naming the offending field.
    pub const fn validate(&self) -> DownloadResult<()> {
        if self.batch_size == 0 {
            return Err(DownloadError::InvalidOptions {
                field: "batch_size",
                reason: "must be at least 1",
            });
        }
        if self.retry_budget == 0 {
            return Err(DownloadError::InvalidOptions {
                field: "retry_budget",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Progress after a successful batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadProgress {
    /// Pages transferred so far.
    pub cur: usize,
    /// Pages planned for the run.
    pub total: usize,
}

/// Callback invoked after every successful batch.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// One gallery download.
#[derive(Clone)]
pub struct DownloadRequest<'a> {
    /// Local API base URL.
    pub base_url: &'a str,
    /// Gallery listing to download from.
    pub listing: &'a LocalApiData,
    /// Chapter names to download; `None` selects every chapter.
    pub chapters: Option<&'a [String]>,
    /// Stop signal consulted before every batch attempt.
    pub stop: StopSignal,
    /// Optional progress observer.
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("base_url", &self.base_url)
            .field("gallery", &self.listing.name)
            .field("chapters", &self.chapters)
            .field("stopped", &self.stop.is_stopped())
            .finish_non_exhaustive()
    }
}

impl<'a> DownloadRequest<'a> {
    /// Download every chapter of `listing` from `base_url`.
    #[must_use]
    pub fn new(base_url: &'a str, listing: &'a LocalApiData) -> Self {
        Self {
            base_url,
            listing,
            chapters: None,
            stop: StopSignal::new(),
            on_progress: None,
        }
    }

    /// Restrict the run to the named chapters.
    #[must_use]
    pub fn with_chapters(mut self, chapters: &'a [String]) -> Self {
        self.chapters = Some(chapters);
        self
    }

    /// Use an externally controlled stop signal.
    #[must_use]
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Observe progress after every successful batch.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(DownloadProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

/// Remote page and the local file it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTransfer {
    /// Remote page URL.
    pub url: String,
    /// Local destination file.
    pub destination: PathBuf,
}

/// Downloads galleries into a [`GalleryLibrary`].
#[derive(Clone)]
pub struct DownloadPipeline {
    library: GalleryLibrary,
    events: EventBus,
    metrics: Metrics,
    options: PipelineOptions,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl DownloadPipeline {
    /// Build a pipeline writing into `library`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidOptions`] for zero-sized options.
    pub fn new(
        library: GalleryLibrary,
        events: EventBus,
        metrics: Metrics,
        options: PipelineOptions,
    ) -> DownloadResult<Self> {
        options.validate()?;
        Ok(Self {
            library,
            events,
            metrics,
            options,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Library the pipeline writes into.
    #[must_use]
    pub const fn library(&self) -> &GalleryLibrary {
        &self.library
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> PipelineOptions {
        self.options
    }

    /// Transfers a run would issue for `draft`, in batch order.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Library`] when a gallery or chapter path
    /// leaves the library root and [`DownloadError::Fs`] when a page name is
    /// absolute or climbs out of its chapter directory.
    pub fn plan_transfers(
        &self,
        base_url: &str,
        gallery_name: &str,
        draft: &GalleryDraft,
    ) -> DownloadResult<Vec<PageTransfer>> {
        let base = base_url.trim_end_matches('/');
        let mut transfers = Vec::with_capacity(draft.files_count);
        for chapter in &draft.chapters {
            let dir = self.library.chapter_dir(&draft.path, &chapter.path)?;
            for page in &chapter.pages {
                let destination = resolve_within(&dir, page)
                    .map_err(|source| DownloadError::fs("resolve_page", source))?;
                transfers.push(PageTransfer {
                    url: format!(
                        "{base}/{}",
                        urlencoding::encode(&format!("{gallery_name}/{}/{page}", chapter.name))
                    ),
                    destination,
                });
            }
        }
        Ok(transfers)
    }

    /// Download the selected chapters and record the gallery.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyInProgress`] when the gallery is being
    /// downloaded already, [`DownloadError::RetriesExhausted`] or
    /// [`DownloadError::Cancelled`] when the transfers do not complete, and
    /// filesystem or library errors from setup and upsert. Chapter
    /// directories created by the run are removed on every failure.
    pub async fn download(&self, request: DownloadRequest<'_>) -> DownloadResult<Gallery> {
        let gallery_name = request.listing.name.clone();
        let _claim = self.claim(&gallery_name)?;

        let draft = GalleryDraft::from_listing(request.listing, request.chapters);
        let mut created = Vec::new();
        match self.run(&request, draft, &mut created).await {
            Ok(gallery) => {
                self.metrics.inc_download_completed();
                self.events.publish(Event::DownloadCompleted {
                    gallery: gallery_name,
                    gallery_id: gallery.id,
                });
                info!(gallery_id = gallery.id, gallery = %gallery.name, "download completed");
                Ok(gallery)
            }
            Err(err) => {
                self.remove_created(&created).await;
                self.metrics.inc_download_failed();
                self.events.publish(Event::DownloadFailed {
                    gallery: gallery_name.clone(),
                    message: err.to_string(),
                });
                warn!(gallery = %gallery_name, error = %err, "download failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        request: &DownloadRequest<'_>,
        draft: GalleryDraft,
        created: &mut Vec<PathBuf>,
    ) -> DownloadResult<Gallery> {
        let gallery_name = &request.listing.name;
        let transfers = self.plan_transfers(request.base_url, gallery_name, &draft)?;
        info!(gallery = %gallery_name, chapters = draft.chapters.len(), pages = transfers.len(), "download started");
        self.events.publish(Event::DownloadStarted {
            gallery: gallery_name.clone(),
            total_pages: transfers.len(),
        });

        self.prepare_directories(&draft, created).await?;
        self.transfer_all(request, &transfers).await?;
        Ok(self.library.upsert(draft).await?)
    }

    async fn prepare_directories(
        &self,
        draft: &GalleryDraft,
        created: &mut Vec<PathBuf>,
    ) -> DownloadResult<()> {
        let files = self.library.files();
        let gallery_dir = self.library.gallery_dir(&draft.path)?;
        files
            .make_directory(&gallery_dir, true)
            .await
            .map_err(|source| DownloadError::fs("make_gallery_directory", source))?;

        for chapter in &draft.chapters {
            let dir = self.library.chapter_dir(&draft.path, &chapter.path)?;
            let exists = files
                .exists(&dir)
                .await
                .map_err(|source| DownloadError::fs("probe_chapter_directory", source))?;
            if exists {
                continue;
            }
            files
                .make_directory(&dir, true)
                .await
                .map_err(|source| DownloadError::fs("make_chapter_directory", source))?;
            created.push(dir);
        }
        Ok(())
    }

    async fn transfer_all(
        &self,
        request: &DownloadRequest<'_>,
        transfers: &[PageTransfer],
    ) -> DownloadResult<()> {
        let total = transfers.len();
        let mut done = 0;
        for (index, batch) in transfers.chunks(self.options.batch_size).enumerate() {
            let mut budget = self.options.retry_budget;
            loop {
                if request.stop.is_stopped() {
                    return Err(DownloadError::Cancelled {
                        gallery: request.listing.name.clone(),
                    });
                }
                if self.transfer_batch(batch).await {
                    break;
                }
                budget -= 1;
                if budget == 0 {
                    return Err(DownloadError::RetriesExhausted {
                        gallery: request.listing.name.clone(),
                        attempts: self.options.retry_budget,
                    });
                }
                self.metrics.inc_batch_retry();
                debug!(gallery = %request.listing.name, batch = index, remaining = budget, "retrying batch");
            }

            done += batch.len();
            self.metrics.add_pages_downloaded(batch.len());
            let progress = DownloadProgress { cur: done, total };
            if let Some(callback) = &request.on_progress {
                callback(progress);
            }
            self.events.publish(Event::DownloadProgress {
                gallery: request.listing.name.clone(),
                cur: progress.cur,
                total: progress.total,
            });
        }
        Ok(())
    }

    async fn transfer_batch(&self, batch: &[PageTransfer]) -> bool {
        let files = self.library.files();
        let results = join_all(
            batch
                .iter()
                .map(|transfer| files.download(&transfer.url, &transfer.destination)),
        )
        .await;

        let mut ok = true;
        for (transfer, result) in batch.iter().zip(results) {
            match result {
                Ok(status) if (200..300).contains(&status) => {}
                Ok(status) => {
                    warn!(url = %transfer.url, status, "page transfer rejected");
                    ok = false;
                }
                Err(err) => {
                    warn!(url = %transfer.url, error = %err, "page transfer failed");
                    ok = false;
                }
            }
        }
        ok
    }

    async fn remove_created(&self, created: &[PathBuf]) {
        for dir in created {
            if let Err(err) = self.library.files().delete(dir).await {
                warn!(path = %dir.display(), error = %err, "chapter directory not removed");
            }
        }
    }

    fn claim(&self, gallery: &str) -> DownloadResult<InFlight> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(gallery.to_string()) {
            return Err(DownloadError::AlreadyInProgress {
                gallery: gallery.to_string(),
            });
        }
        Ok(InFlight {
            set: Arc::clone(&self.in_flight),
            gallery: gallery.to_string(),
        })
    }
}

/// Releases a gallery claim when the run ends.
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    gallery: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.gallery);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_options_are_rejected() {
        let err = PipelineOptions {
            batch_size: 0,
            retry_budget: 3,
        }
        .validate()
        .expect_err("zero batch");
        assert!(matches!(
            err,
            DownloadError::InvalidOptions {
                field: "batch_size",
                ..
            }
        ));
        assert!(
            PipelineOptions {
                batch_size: 3,
                retry_budget: 0
            }
            .validate()
            .is_err()
        );
        assert!(PipelineOptions::default().validate().is_ok());
    }
}
