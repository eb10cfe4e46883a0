//! Single-consumer background queue of page downloads.
//!
//! # Design
//! - `start` loads the pending rows and spawns one consumer task; a second
//!   `start` while it runs is a no-op.
//! - The consumer transfers one page at a time, without retry, and pauses a
//!   fixed delay between items. Completed rows are deleted and failed rows
//!   flagged, so refills only see untouched work.
//! - A failed queue-store write ends the task and leaves the row pending.
//! - An empty refill ends the task; the queue is idle until the next `start`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mangashelf_events::{Event, EventBus};
use mangashelf_fsops::{FileSystem, resolve_within};
use mangashelf_library::{LocalApiData, normalize};
use mangashelf_telemetry::{Metrics, QueueOutcome};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::control::StopSignal;
use crate::error::{DownloadError, DownloadResult};
use crate::queue_store::{NewQueueItem, QueueItem, QueueStore};

/// Pause between two consumed items.
pub const DEFAULT_QUEUE_DELAY: Duration = Duration::from_millis(100);

/// Background queue over a [`QueueStore`].
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    store: Arc<dyn QueueStore>,
    files: Arc<dyn FileSystem>,
    root: PathBuf,
    events: EventBus,
    metrics: Metrics,
    delay: Duration,
    running: AtomicBool,
}

/// Control over a running consumer.
#[derive(Debug)]
pub struct QueueHandle {
    stop: StopSignal,
    task: JoinHandle<()>,
}

impl QueueHandle {
    /// Ask the consumer to stop after the current item.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Signal that stops the consumer, for use while awaiting [`Self::join`].
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Wait for the consumer to go idle or stop.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            error!(error = %err, "download queue task aborted");
        }
    }
}

impl DownloadQueue {
    /// Queue writing pages below `root`.
    #[must_use]
    pub fn new(
        store: Arc<dyn QueueStore>,
        files: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        events: EventBus,
        metrics: Metrics,
        delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                files,
                root: root.into(),
                events,
                metrics,
                delay,
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Whether a consumer task is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Persist one row per page of `listing`, to be fetched from `api_url`.
    ///
    /// Pages land in the same normalised layout the download pipeline uses.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be written.
    pub async fn enqueue_gallery(&self, listing: &LocalApiData, api_url: &str) -> DownloadResult<usize> {
        let gallery_path = normalize(&listing.full_path);
        let items: Vec<NewQueueItem> = listing
            .files
            .iter()
            .flat_map(|chapter| {
                let chapter_path = normalize(&chapter.name);
                let gallery_path = gallery_path.as_str();
                chapter.files.iter().map(move |page| NewQueueItem {
                    page_path: format!("{}/{page}", chapter.full_path),
                    target_path: format!("{gallery_path}/{chapter_path}/{page}"),
                    api_url: api_url.to_string(),
                })
            })
            .collect();
        let ids = self.inner.store.enqueue(&items).await?;
        info!(gallery = %listing.name, pages = ids.len(), "gallery queued");
        Ok(ids.len())
    }

    /// Rows waiting to be transferred.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read.
    pub async fn pending(&self) -> DownloadResult<Vec<QueueItem>> {
        self.inner.store.pending().await
    }

    /// Rows whose transfer failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be read.
    pub async fn failed(&self) -> DownloadResult<Vec<QueueItem>> {
        self.inner.store.failed().await
    }

    /// Requeue every failed row.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows cannot be updated.
    pub async fn retry_failed(&self) -> DownloadResult<u64> {
        self.inner.store.retry_failed().await
    }

    /// Start consuming unless a consumer is already running.
    ///
    /// Returns `None` when a consumer is already active.
    ///
    /// # Errors
    ///
    /// Returns an error if the pending rows cannot be loaded; the queue stays
    /// idle in that case.
    pub async fn start(&self) -> DownloadResult<Option<QueueHandle>> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(None);
        }
        let running = RunningFlag(Arc::clone(&self.inner));

        let items = self.inner.store.pending().await?;
        info!(pending = items.len(), "download queue started");
        let stop = StopSignal::new();
        let task = tokio::spawn(consume(running, items.into(), stop.clone()));
        Ok(Some(QueueHandle { stop, task }))
    }
}

/// Clears the running flag when the consumer ends or `start` bails out.
struct RunningFlag(Arc<QueueInner>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

async fn consume(running: RunningFlag, mut items: VecDeque<QueueItem>, stop: StopSignal) {
    let inner = &running.0;
    loop {
        if stop.is_stopped() {
            info!("download queue stopped");
            return;
        }
        let Some(item) = items.pop_front() else {
            match inner.store.pending().await {
                Ok(refill) if !refill.is_empty() => {
                    items = refill.into();
                    continue;
                }
                Ok(_) => {
                    inner.metrics.set_queue_depth(0);
                    inner.events.publish(Event::QueueIdle);
                    info!("download queue idle");
                }
                Err(err) => error!(error = %err, "download queue refill failed"),
            }
            return;
        };
        inner.metrics.set_queue_depth(items.len());
        if let Err(err) = inner.process(&item).await {
            error!(item_id = item.id, error = %err, "download queue stopped: queue row not updated");
            return;
        }

        tokio::select! {
            () = stop.stopped() => {
                info!("download queue stopped");
                return;
            }
            () = tokio::time::sleep(inner.delay) => {}
        }
    }
}

impl QueueInner {
    /// Transfer one item and record the outcome. Only a failed queue-store
    /// write is returned; transfer failures are recorded on the row.
    async fn process(&self, item: &QueueItem) -> DownloadResult<()> {
        let url = format!(
            "{}/download?file={}",
            item.api_url.trim_end_matches('/'),
            urlencoding::encode(&item.page_path)
        );
        match self.transfer(&url, &item.target_path).await {
            Ok(()) => {
                self.store.complete(item.id).await?;
                self.metrics.inc_queue_item(QueueOutcome::Completed);
                self.events.publish(Event::QueueItemCompleted {
                    item_id: item.id,
                    page_path: item.page_path.clone(),
                });
            }
            Err(err) => {
                warn!(item_id = item.id, url = %url, error = %err, "queued page failed");
                self.store.mark_failed(item.id).await?;
                self.metrics.inc_queue_item(QueueOutcome::Failed);
                self.events.publish(Event::QueueItemFailed {
                    item_id: item.id,
                    page_path: item.page_path.clone(),
                    message: err.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn transfer(&self, url: &str, target_path: &str) -> DownloadResult<()> {
        let destination = resolve_within(&self.root, target_path)
            .map_err(|source| DownloadError::fs("resolve_target", source))?;
        if let Some(parent) = destination.parent().filter(|parent| *parent != Path::new("")) {
            self.files
                .make_directory(parent, true)
                .await
                .map_err(|source| DownloadError::fs("make_target_directory", source))?;
        }
        let status = self
            .files
            .download(url, &destination)
            .await
            .map_err(|source| DownloadError::fs("download", source))?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(DownloadError::TransferStatus {
                url: url.to_string(),
                status,
            })
        }
    }
}
