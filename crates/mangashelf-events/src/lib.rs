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

//! Event primitives shared across the mangashelf workspace.
//!
//! Two notification channels live here:
//! - `routing.rs`: the lifecycle [`EventBus`] for download and queue events,
//!   with a bounded replay ring for late subscribers.
//! - `feed.rs`: the [`CollectionFeed`] used by collection stores to push
//!   ordered change notifications and replay the current snapshot on
//!   subscribe.
//!
//! Payload definitions live in `payloads.rs`.

pub mod feed;
pub mod payloads;
pub mod routing;

pub use feed::{ChangeKind, CollectionChange, CollectionFeed, Subscription};
pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
