//! Sample Local API listings.

use mangashelf_library::{LocalApiData, LocalApiDataFiles, LocalApiResponse};

/// Display name of the sample gallery.
pub const TEST_MANGA: &str = "Test Manga";

/// Listing entry for one chapter of `gallery`.
#[must_use]
pub fn chapter(gallery: &str, name: &str, pages: &[&str]) -> LocalApiDataFiles {
    LocalApiDataFiles {
        full_path: format!("{gallery}/{name}"),
        name: name.to_string(),
        files: pages.iter().map(ToString::to_string).collect(),
    }
}

/// `Test Manga` with `Chapter-1` (three pages) and `Chapter-2` (two pages).
#[must_use]
pub fn sample_listing() -> LocalApiData {
    LocalApiData {
        full_path: TEST_MANGA.to_string(),
        name: TEST_MANGA.to_string(),
        files: vec![
            chapter(TEST_MANGA, "Chapter-1", &["01.png", "02.png", "03.png"]),
            chapter(TEST_MANGA, "Chapter-2", &["01.png", "02.png"]),
        ],
    }
}

/// [`sample_listing`] after the server gained a one-page `Chapter-3`.
#[must_use]
pub fn sample_listing_with_third_chapter() -> LocalApiData {
    let mut listing = sample_listing();
    listing
        .files
        .push(chapter(TEST_MANGA, "Chapter-3", &["01.png"]));
    listing
}

/// A gallery with `pages` single-chapter pages named `01.png`, `02.png`, ...
#[must_use]
pub fn single_chapter_listing(name: &str, pages: usize) -> LocalApiData {
    let files: Vec<String> = (1..=pages).map(|page| format!("{page:02}.png")).collect();
    let refs: Vec<&str> = files.iter().map(String::as_str).collect();
    LocalApiData {
        full_path: name.to_string(),
        name: name.to_string(),
        files: vec![chapter(name, "Chapter-1", &refs)],
    }
}

/// Listing response wrapping `galleries`.
#[must_use]
pub fn response(galleries: Vec<LocalApiData>) -> LocalApiResponse {
    LocalApiResponse {
        count: galleries.len(),
        data: galleries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_listing_has_five_pages() {
        assert_eq!(sample_listing().page_count(), 5);
        assert_eq!(sample_listing_with_third_chapter().page_count(), 6);
        assert_eq!(single_chapter_listing("Long", 12).files[0].files[11], "12.png");
        assert_eq!(response(vec![sample_listing()]).count, 1);
    }
}
