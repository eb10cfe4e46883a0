//! Prometheus-backed counters for downloads and the background queue.
//!
//! # Design
//! - Collector registration stays private; callers only see typed helpers.
//! - Clones share one registry, so the pipeline and the queue report into
//!   the same exposition.

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    pages_downloaded_total: IntCounter,
    batch_retries_total: IntCounter,
    downloads_completed_total: IntCounter,
    downloads_failed_total: IntCounter,
    queue_items_total: IntCounterVec,
    queue_depth: IntGauge,
}

/// Terminal state of one background queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// The page was transferred and the row removed.
    Completed,
    /// The transfer failed and the row was flagged.
    Failed,
}

impl QueueOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Snapshot of the counters for status output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Pages transferred by interactive downloads.
    pub pages_downloaded_total: u64,
    /// Batches retried after a failed transfer.
    pub batch_retries_total: u64,
    /// Gallery downloads that finished and were recorded.
    pub downloads_completed_total: u64,
    /// Gallery downloads that were abandoned.
    pub downloads_failed_total: u64,
    /// Queue items that completed.
    pub queue_completed_total: u64,
    /// Queue items that failed.
    pub queue_failed_total: u64,
    /// Queue items currently buffered in memory.
    pub queue_depth: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let pages_downloaded_total = IntCounter::with_opts(Opts::new(
            "pages_downloaded_total",
            "Pages transferred by gallery downloads",
        ))?;
        let batch_retries_total = IntCounter::with_opts(Opts::new(
            "batch_retries_total",
            "Download batches retried after a failed transfer",
        ))?;
        let downloads_completed_total = IntCounter::with_opts(Opts::new(
            "downloads_completed_total",
            "Gallery downloads recorded in the library",
        ))?;
        let downloads_failed_total = IntCounter::with_opts(Opts::new(
            "downloads_failed_total",
            "Gallery downloads abandoned after cleanup",
        ))?;
        let queue_items_total = IntCounterVec::new(
            Opts::new("queue_items_total", "Background queue items by outcome"),
            &["outcome"],
        )?;
        let queue_depth = IntGauge::with_opts(Opts::new(
            "queue_depth",
            "Background queue items buffered in memory",
        ))?;

        registry.register(Box::new(pages_downloaded_total.clone()))?;
        registry.register(Box::new(batch_retries_total.clone()))?;
        registry.register(Box::new(downloads_completed_total.clone()))?;
        registry.register(Box::new(downloads_failed_total.clone()))?;
        registry.register(Box::new(queue_items_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                pages_downloaded_total,
                batch_retries_total,
                downloads_completed_total,
                downloads_failed_total,
                queue_items_total,
                queue_depth,
            }),
        })
    }

    /// Add transferred pages.
    pub fn add_pages_downloaded(&self, pages: usize) {
        self.inner
            .pages_downloaded_total
            .inc_by(u64::try_from(pages).unwrap_or(u64::MAX));
    }

    /// Count one batch retry.
    pub fn inc_batch_retry(&self) {
        self.inner.batch_retries_total.inc();
    }

    /// Count one recorded gallery download.
    pub fn inc_download_completed(&self) {
        self.inner.downloads_completed_total.inc();
    }

    /// Count one abandoned gallery download.
    pub fn inc_download_failed(&self) {
        self.inner.downloads_failed_total.inc();
    }

    /// Count one finished queue item.
    pub fn inc_queue_item(&self, outcome: QueueOutcome) {
        self.inner
            .queue_items_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Set the in-memory queue depth gauge.
    pub fn set_queue_depth(&self, depth: usize) {
        self.inner
            .queue_depth
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let queue = |outcome: QueueOutcome| {
            self.inner
                .queue_items_total
                .with_label_values(&[outcome.label()])
                .get()
        };
        MetricsSnapshot {
            pages_downloaded_total: self.inner.pages_downloaded_total.get(),
            batch_retries_total: self.inner.batch_retries_total.get(),
            downloads_completed_total: self.inner.downloads_completed_total.get(),
            downloads_failed_total: self.inner.downloads_failed_total.get(),
            queue_completed_total: queue(QueueOutcome::Completed),
            queue_failed_total: queue(QueueOutcome::Failed),
            queue_depth: self.inner.queue_depth.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.add_pages_downloaded(5);
        metrics.inc_batch_retry();
        metrics.inc_batch_retry();
        metrics.inc_download_completed();
        metrics.inc_download_failed();
        metrics.inc_queue_item(QueueOutcome::Completed);
        metrics.inc_queue_item(QueueOutcome::Failed);
        metrics.inc_queue_item(QueueOutcome::Failed);
        metrics.set_queue_depth(4);

        let snapshot = metrics.clone().snapshot();
        assert_eq!(snapshot.pages_downloaded_total, 5);
        assert_eq!(snapshot.batch_retries_total, 2);
        assert_eq!(snapshot.downloads_completed_total, 1);
        assert_eq!(snapshot.downloads_failed_total, 1);
        assert_eq!(snapshot.queue_completed_total, 1);
        assert_eq!(snapshot.queue_failed_total, 2);
        assert_eq!(snapshot.queue_depth, 4);

        let rendered = metrics.render()?;
        assert!(rendered.contains("pages_downloaded_total 5"));
        assert!(rendered.contains("queue_items_total{outcome=\"failed\"} 2"));
        Ok(())
    }
}
