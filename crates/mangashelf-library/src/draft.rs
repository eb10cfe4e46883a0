//! Planning gallery drafts from Local API listings.

use crate::model::{Chapter, GalleryDraft, LocalApiData, LocalApiDataFiles};
use crate::slug::normalize;

impl GalleryDraft {
    /// Plan the gallery produced by downloading `selection` from `listing`.
    ///
    /// `None` selects every chapter. Selected names absent from the listing
    /// are ignored; chapters keep listing order. Counts cover the selected
    /// chapters only.
    #[must_use]
    pub fn from_listing(listing: &LocalApiData, selection: Option<&[String]>) -> Self {
        let chapters: Vec<Chapter> = selected_chapters(listing, selection)
            .map(|entry| Chapter {
                name: entry.name.clone(),
                path: normalize(&entry.name),
                pages: entry.files.clone(),
                read: false,
                current_page: 0,
            })
            .collect();
        Self {
            name: listing.name.clone(),
            path: normalize(&listing.full_path),
            dirs_count: chapters.len(),
            files_count: chapters.iter().map(|chapter| chapter.pages.len()).sum(),
            chapters,
        }
    }
}

/// Chapters of `listing` matching `selection` in listing order.
pub fn selected_chapters<'a>(
    listing: &'a LocalApiData,
    selection: Option<&'a [String]>,
) -> impl Iterator<Item = &'a LocalApiDataFiles> + 'a {
    listing.files.iter().filter(move |entry| {
        selection.is_none_or(|names| names.iter().any(|name| *name == entry.name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> LocalApiData {
        LocalApiData {
            full_path: "Test Manga".into(),
            name: "Test Manga".into(),
            files: vec![
                LocalApiDataFiles {
                    full_path: "Test Manga/Chapter-1".into(),
                    name: "Chapter-1".into(),
                    files: vec!["01.png".into(), "02.png".into(), "03.png".into()],
                },
                LocalApiDataFiles {
                    full_path: "Test Manga/Chapter-2".into(),
                    name: "Chapter-2".into(),
                    files: vec!["01.png".into(), "02.png".into()],
                },
            ],
        }
    }

    #[test]
    fn plans_every_chapter_without_selection() {
        let draft = GalleryDraft::from_listing(&listing(), None);
        assert_eq!(draft.path, "test-manga");
        assert_eq!(draft.dirs_count, 2);
        assert_eq!(draft.files_count, 5);
        assert_eq!(
            draft
                .chapters
                .iter()
                .map(|chapter| chapter.path.as_str())
                .collect::<Vec<_>>(),
            vec!["chapter-1", "chapter-2"]
        );
        assert!(draft.chapters.iter().all(|chapter| !chapter.read && chapter.current_page == 0));
    }

    #[test]
    fn counts_follow_the_selection() {
        let selection = vec!["Chapter-2".to_string(), "Chapter-9".to_string()];
        let draft = GalleryDraft::from_listing(&listing(), Some(&selection));
        assert_eq!(draft.dirs_count, 1);
        assert_eq!(draft.files_count, 2);
        assert_eq!(draft.chapters[0].name, "Chapter-2");

        let empty = GalleryDraft::from_listing(&listing(), Some(&[]));
        assert!(empty.chapters.is_empty());
        assert_eq!((empty.dirs_count, empty.files_count), (0, 0));
    }
}
