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

//! HTTP collaborators: the Local API listing server and the metadata
//! service.
//!
//! Layout: `local_api.rs` (listing client), `metadata.rs` (GraphQL media
//! lookup), `enrich.rs` (metadata pass over the library), `error.rs`.

pub mod enrich;
pub mod error;
pub mod local_api;
pub mod metadata;

pub use enrich::{EnrichReport, enrich_library};
pub use error::{RemoteError, RemoteResult};
pub use local_api::LocalApiClient;
pub use metadata::{DEFAULT_METADATA_URL, MEDIA_QUERY, MetadataClient};
