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

//! Moving pages from a Local API server into the library.
//!
//! Layout: `pipeline.rs` (batched, retrying gallery downloads), `queue.rs`
//! (single-consumer background queue), `queue_store.rs` (persisted queue
//! rows), `control.rs` (stop signal), `error.rs`.

pub mod control;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod queue_store;

pub use control::StopSignal;
pub use error::{DownloadError, DownloadResult};
pub use pipeline::{
    DEFAULT_BATCH_SIZE, DEFAULT_RETRY_BUDGET, DownloadPipeline, DownloadProgress, DownloadRequest,
    PageTransfer, PipelineOptions, ProgressCallback,
};
pub use queue::{DEFAULT_QUEUE_DELAY, DownloadQueue, QueueHandle};
pub use queue_store::{NewQueueItem, QueueItem, QueueStore, SqliteQueueStore};
