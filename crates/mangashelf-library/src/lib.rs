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

//! Gallery domain for mangashelf: the persisted model, name normalisation,
//! merge rules and the read-state operations applied from the reader.
//!
//! Layout: `model.rs` (gallery and listing types), `slug.rs` (display name to
//! directory name), `draft.rs` (listing to gallery plan), `gallery.rs`
//! ([`GalleryLibrary`] and [`merge_gallery`]), `browse.rs` (sorting and
//! presentation helpers), `error.rs`.

pub mod browse;
pub mod draft;
pub mod error;
pub mod gallery;
pub mod model;
pub mod slug;

pub use browse::{
    SortKind, SortOrder, chapter_number, chapters_in_reading_order, gallery_detail,
    last_read_chapter, sort_galleries, visible_galleries,
};
pub use draft::selected_chapters;
pub use error::{LibraryError, LibraryResult};
pub use gallery::{GalleryLibrary, merge_gallery};
pub use model::{
    Chapter, CoverImage, GALLERY_COLLECTION, Gallery, GalleryDraft, LocalApiData,
    LocalApiDataFiles, LocalApiResponse, Manga, MangaStatus, MangaTitle,
};
pub use slug::normalize;
