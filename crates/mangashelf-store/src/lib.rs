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

//! Persistence layer for mangashelf collections.
//!
//! Layout: `kv.rs` (the [`KeyValueStore`] contract and the in-memory
//! backend), `sqlite.rs` (`SQLite` backend), `collection.rs` (indexed
//! [`CollectionStore`] with change notification), `error.rs`.

pub mod collection;
pub mod error;
pub mod kv;
pub mod sqlite;

pub use collection::{CollectionStore, Keyed};
pub use error::{KvError, KvResult, StoreError, StoreResult};
pub use kv::{KeyValueStore, MemoryKeyValueStore};
pub use mangashelf_events::{ChangeKind, CollectionChange, Subscription};
pub use sqlite::{SqliteKeyValueStore, connect_pool};
