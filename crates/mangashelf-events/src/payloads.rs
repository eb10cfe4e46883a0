//! Typed lifecycle events published on the [`crate::EventBus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each event published on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Download and queue events surfaced to observers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A gallery download run has been planned and is about to transfer pages.
    DownloadStarted {
        /// Gallery name as reported by the Local API.
        gallery: String,
        /// Number of pages the run will transfer.
        total_pages: usize,
    },
    /// A batch completed successfully.
    DownloadProgress {
        /// Gallery name as reported by the Local API.
        gallery: String,
        /// Pages completed so far.
        cur: usize,
        /// Pages planned for the run.
        total: usize,
    },
    /// All pages were transferred and the gallery was upserted.
    DownloadCompleted {
        /// Gallery name as reported by the Local API.
        gallery: String,
        /// Identifier of the stored gallery.
        gallery_id: u64,
    },
    /// The run failed and created directories were rolled back.
    DownloadFailed {
        /// Gallery name as reported by the Local API.
        gallery: String,
        /// Failure description.
        message: String,
    },
    /// A queued page was fetched and its row removed.
    QueueItemCompleted {
        /// Queue row identifier.
        item_id: i64,
        /// Remote page path.
        page_path: String,
    },
    /// A queued page failed and was flagged.
    QueueItemFailed {
        /// Queue row identifier.
        item_id: i64,
        /// Remote page path.
        page_path: String,
        /// Failure description.
        message: String,
    },
    /// The queue drained and the consumer went idle.
    QueueIdle,
}

impl Event {
    /// Machine-friendly discriminator used for metrics labels and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DownloadStarted { .. } => "download_started",
            Self::DownloadProgress { .. } => "download_progress",
            Self::DownloadCompleted { .. } => "download_completed",
            Self::DownloadFailed { .. } => "download_failed",
            Self::QueueItemCompleted { .. } => "queue_item_completed",
            Self::QueueItemFailed { .. } => "queue_item_failed",
            Self::QueueIdle => "queue_idle",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Time the event was published.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serialized_tag() -> anyhow::Result<()> {
        let event = Event::DownloadProgress {
            gallery: "Test Manga".into(),
            cur: 3,
            total: 5,
        };
        let value = serde_json::to_value(&event)?;
        assert_eq!(value["type"], event.kind());
        assert_eq!(value["cur"], 3);

        let idle = serde_json::to_value(Event::QueueIdle)?;
        assert_eq!(idle["type"], "queue_idle");
        Ok(())
    }
}
