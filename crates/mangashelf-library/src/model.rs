//! Persisted gallery records and Local API payloads.
//!
//! Field names serialise in camelCase so stored records and listing
//! responses keep their established JSON shape.

use chrono::{DateTime, Utc};
use mangashelf_store::Keyed;
use serde::{Deserialize, Serialize};

/// Collection name under which galleries are persisted.
pub const GALLERY_COLLECTION: &str = "galleries";

/// One downloaded chapter of a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Display name as reported by the Local API.
    pub name: String,
    /// Normalised directory name below the gallery directory.
    pub path: String,
    /// Page file names in reading order.
    pub pages: Vec<String>,
    /// Whether the chapter has been read.
    #[serde(default)]
    pub read: bool,
    /// Resume position while reading.
    #[serde(default)]
    pub current_page: usize,
}

/// A locally downloaded manga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    /// Store-assigned identifier.
    pub id: u64,
    /// Display name; unique within the collection.
    pub name: String,
    /// Normalised directory name below the library root.
    pub path: String,
    /// Chapter directories planned by the first download.
    pub dirs_count: usize,
    /// Page files planned by the first download.
    pub files_count: usize,
    /// Last time a chapter was opened or marked read (RFC 3339 on disk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_at: Option<DateTime<Utc>>,
    /// Chapters in download order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Metadata attached from the metadata service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manga: Option<Manga>,
    /// Manual filter flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<bool>,
}

impl Gallery {
    /// Chapter with the given display name.
    #[must_use]
    pub fn chapter(&self, name: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|chapter| chapter.name == name)
    }

    /// Whether the gallery is manually filtered.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.filtered.unwrap_or(false)
    }
}

/// Gallery payload before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryDraft {
    /// Display name; the merge key.
    pub name: String,
    /// Normalised directory name below the library root.
    pub path: String,
    /// Number of chapters in the draft.
    pub dirs_count: usize,
    /// Number of pages across the draft's chapters.
    pub files_count: usize,
    /// Chapters in listing order.
    pub chapters: Vec<Chapter>,
}

impl Keyed for Gallery {
    type Draft = GalleryDraft;

    fn id(&self) -> u64 {
        self.id
    }

    fn from_draft(id: u64, draft: GalleryDraft) -> Self {
        Self {
            id,
            name: draft.name,
            path: draft.path,
            dirs_count: draft.dirs_count,
            files_count: draft.files_count,
            last_read_at: None,
            chapters: draft.chapters,
            manga: None,
            filtered: None,
        }
    }
}

/// Publication status reported by the metadata service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MangaStatus {
    /// Publication completed.
    Finished,
    /// Still publishing.
    Releasing,
    /// Announced, not yet published.
    NotYetReleased,
    /// Publication cancelled.
    Cancelled,
    /// Publication paused.
    Hiatus,
}

impl MangaStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Finished => "Finished",
            Self::Releasing => "Releasing",
            Self::NotYetReleased => "Not released",
            Self::Cancelled => "Cancelled",
            Self::Hiatus => "Hiatus",
        }
    }
}

/// Cover artwork URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    /// Dominant colour as a hex string.
    #[serde(default)]
    pub color: Option<String>,
    /// Largest available cover.
    #[serde(default, alias = "extraLarge")]
    pub xlarge: Option<String>,
    /// Large cover.
    #[serde(default)]
    pub large: Option<String>,
    /// Medium cover used in listings.
    #[serde(default)]
    pub medium: Option<String>,
}

/// Localised titles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaTitle {
    /// English title.
    #[serde(default)]
    pub english: Option<String>,
    /// Romanised title.
    #[serde(default)]
    pub romaji: Option<String>,
}

/// Metadata attached inline on a gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    /// Metadata service identifier.
    pub id: u64,
    /// `MyAnimeList` identifier.
    #[serde(default)]
    pub id_mal: Option<u64>,
    /// Localised titles.
    #[serde(default)]
    pub title: MangaTitle,
    /// Publication status.
    #[serde(default)]
    pub status: Option<MangaStatus>,
    /// Synopsis, may contain `<br>` tags.
    #[serde(default)]
    pub description: Option<String>,
    /// Published chapter count.
    #[serde(default)]
    pub chapters: Option<u32>,
    /// Cover artwork.
    #[serde(default)]
    pub cover_image: CoverImage,
    /// Banner artwork.
    #[serde(default)]
    pub banner_image: Option<String>,
    /// Genre tags.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Alternative titles.
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Average score out of 100.
    #[serde(default)]
    pub average_score: Option<u32>,
    /// Number of users who favourited the title.
    #[serde(default, alias = "favourites")]
    pub favorites: Option<u32>,
    /// Public page on the metadata site.
    #[serde(default, alias = "site_url")]
    pub site_url: Option<String>,
}

/// Chapter directory in a Local API listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalApiDataFiles {
    /// Path of the chapter directory on the server.
    pub full_path: String,
    /// Chapter display name.
    pub name: String,
    /// Page file names in display order.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Gallery directory in a Local API listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalApiData {
    /// Path of the gallery directory on the server.
    pub full_path: String,
    /// Gallery display name.
    pub name: String,
    /// Chapter directories.
    #[serde(default)]
    pub files: Vec<LocalApiDataFiles>,
}

impl LocalApiData {
    /// Total number of pages across every chapter.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.files.iter().map(|chapter| chapter.files.len()).sum()
    }
}

/// Response of the Local API listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalApiResponse {
    /// Number of galleries reported by the server.
    pub count: usize,
    /// Gallery directories.
    #[serde(default)]
    pub data: Vec<LocalApiData>,
}

impl LocalApiResponse {
    /// Gallery with the given display name.
    #[must_use]
    pub fn gallery(&self, name: &str) -> Option<&LocalApiData> {
        self.data.iter().find(|gallery| gallery.name == name)
    }
}
