#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Process configuration and persisted user settings.
//!
//! Layout: `defaults.rs` (default values), `model.rs` ([`AppConfig`]),
//! `loader.rs` (environment parsing and validation), `settings.rs`
//! ([`ServerSettings`] in the key-value store), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use model::AppConfig;
pub use settings::{SERVER_URL_KEY, ServerSettings};
