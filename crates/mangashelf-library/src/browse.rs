//! Read-only queries used when presenting the library.

use std::cmp::Ordering;

use crate::model::{Chapter, Gallery};

/// Chapter to resume: the first unread chapter, else the first chapter.
/// `None` only for a gallery without chapters.
#[must_use]
pub fn last_read_chapter(gallery: &Gallery) -> Option<&Chapter> {
    gallery
        .chapters
        .iter()
        .find(|chapter| !chapter.read)
        .or_else(|| gallery.chapters.first())
}

/// Number parsed from the digits of the chapter name before its first `-`.
///
/// `"Chapter 12-The End"` yields `12`; a name without digits in that prefix
/// yields `None`.
#[must_use]
pub fn chapter_number(chapter: &Chapter) -> Option<u64> {
    let prefix = chapter.name.split('-').next().unwrap_or_default();
    let digits: String = prefix.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Multi-line summary of the attached metadata; empty without metadata.
#[must_use]
pub fn gallery_detail(gallery: &Gallery) -> String {
    let Some(manga) = &gallery.manga else {
        return String::new();
    };
    let mut lines = Vec::new();
    if let Some(favorites) = manga.favorites.filter(|count| *count > 0) {
        lines.push(format!("Favorites: {favorites}"));
    }
    if let Some(status) = manga.status {
        lines.push(format!("Status: {}", status.label()));
    }
    if let Some(score) = manga.average_score.filter(|score| *score > 0) {
        lines.push(format!("Average Score: {score}"));
    }
    if let Some(description) = manga.description.as_deref().filter(|text| !text.is_empty()) {
        let description = description.replace("<br/>", "\n").replace("<br>", "\n");
        lines.push(format!("Description: {description}"));
    }
    lines.join("\n")
}

/// Sort key for gallery listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKind {
    /// Alphabetical by display name.
    #[default]
    Name,
    /// Most recently read first; never-read galleries last.
    LastRead,
    /// Fewest chapters first.
    ChapterCount,
}

/// Direction applied after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Natural order of the sort key.
    #[default]
    Asc,
    /// Reversed order.
    Desc,
}

/// Sort galleries for display.
pub fn sort_galleries(galleries: &mut [Gallery], kind: SortKind, order: SortOrder) {
    match kind {
        SortKind::Name => galleries.sort_by(|a, b| compare_names(&a.name, &b.name)),
        SortKind::LastRead => galleries.sort_by(|a, b| match (a.last_read_at, b.last_read_at) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKind::ChapterCount => galleries.sort_by_key(|gallery| gallery.chapters.len()),
    }
    if order == SortOrder::Desc {
        galleries.reverse();
    }
}

/// Galleries to show. Unless `show_adult` is set, galleries whose genres
/// contain any of `adult_tags` and manually filtered galleries are hidden.
#[must_use]
pub fn visible_galleries<'a>(
    galleries: &'a [Gallery],
    adult_tags: &[String],
    show_adult: bool,
) -> Vec<&'a Gallery> {
    galleries
        .iter()
        .filter(|gallery| {
            if show_adult {
                return true;
            }
            if gallery.is_filtered() {
                return false;
            }
            gallery.manga.as_ref().is_none_or(|manga| {
                !adult_tags
                    .iter()
                    .any(|tag| manga.genres.iter().any(|genre| genre.eq_ignore_ascii_case(tag)))
            })
        })
        .collect()
}

/// Chapters ordered by name with embedded numbers compared numerically, so
/// `Chapter-2` sorts before `Chapter-10`.
#[must_use]
pub fn chapters_in_reading_order(gallery: &Gallery) -> Vec<&Chapter> {
    let mut chapters: Vec<&Chapter> = gallery.chapters.iter().collect();
    chapters.sort_by(|a, b| compare_natural(&a.name, &b.name));
    chapters
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_natural(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return compare_names(a, b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_digits = take_digits(&mut left);
                let r_digits = take_digits(&mut right);
                let ordering = l_digits
                    .trim_start_matches('0')
                    .len()
                    .cmp(&r_digits.trim_start_matches('0').len())
                    .then_with(|| {
                        l_digits
                            .trim_start_matches('0')
                            .cmp(r_digits.trim_start_matches('0'))
                    });
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_ascii_lowercase().cmp(&r.to_ascii_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(ch) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(ch);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Manga, MangaStatus};
    use chrono::{Duration, Utc};

    fn chapter(name: &str, read: bool) -> Chapter {
        Chapter {
            name: name.into(),
            path: crate::slug::normalize(name),
            pages: vec!["01.png".into()],
            read,
            current_page: 0,
        }
    }

    fn gallery(id: u64, name: &str, chapters: Vec<Chapter>) -> Gallery {
        Gallery {
            id,
            name: name.into(),
            path: crate::slug::normalize(name),
            dirs_count: chapters.len(),
            files_count: chapters.len(),
            last_read_at: None,
            chapters,
            manga: None,
            filtered: None,
        }
    }

    fn manga(genres: &[&str]) -> Manga {
        Manga {
            id: 1,
            id_mal: None,
            title: crate::model::MangaTitle::default(),
            status: Some(MangaStatus::NotYetReleased),
            description: Some("First line<br>Second<br/>Third".into()),
            chapters: None,
            cover_image: crate::model::CoverImage::default(),
            banner_image: None,
            genres: genres.iter().map(ToString::to_string).collect(),
            synonyms: Vec::new(),
            average_score: Some(71),
            favorites: Some(12),
            site_url: None,
        }
    }

    #[test]
    fn last_read_chapter_prefers_first_unread() {
        let mixed = gallery(
            1,
            "A",
            vec![chapter("1", true), chapter("2", false), chapter("3", false)],
        );
        assert_eq!(last_read_chapter(&mixed).map(|c| c.name.as_str()), Some("2"));

        let all_read = gallery(2, "B", vec![chapter("1", true), chapter("2", true)]);
        assert_eq!(last_read_chapter(&all_read).map(|c| c.name.as_str()), Some("1"));

        assert!(last_read_chapter(&gallery(3, "C", Vec::new())).is_none());
    }

    #[test]
    fn chapter_number_reads_digits_before_first_dash() {
        assert_eq!(chapter_number(&chapter("Chapter 12-The End", false)), Some(12));
        assert_eq!(chapter_number(&chapter("Vol.2 Ch.3-4", false)), Some(23));
        assert_eq!(chapter_number(&chapter("Chapter-1", false)), None);
        assert_eq!(chapter_number(&chapter("Prologue", false)), None);
    }

    #[test]
    fn detail_lists_available_metadata() {
        let mut with_meta = gallery(1, "A", Vec::new());
        assert_eq!(gallery_detail(&with_meta), "");
        with_meta.manga = Some(manga(&[]));
        assert_eq!(
            gallery_detail(&with_meta),
            "Favorites: 12\nStatus: Not released\nAverage Score: 71\nDescription: First line\nSecond\nThird"
        );
    }

    #[test]
    fn sorting_by_each_kind() {
        let now = Utc::now();
        let mut galleries = vec![
            gallery(1, "beta", vec![chapter("1", false)]),
            gallery(2, "Alpha", vec![chapter("1", false), chapter("2", false)]),
            gallery(3, "gamma", Vec::new()),
        ];
        galleries[0].last_read_at = Some(now - Duration::hours(2));
        galleries[2].last_read_at = Some(now);

        sort_galleries(&mut galleries, SortKind::Name, SortOrder::Asc);
        assert_eq!(ids(&galleries), vec![2, 1, 3]);

        sort_galleries(&mut galleries, SortKind::LastRead, SortOrder::Asc);
        assert_eq!(ids(&galleries), vec![3, 1, 2]);

        sort_galleries(&mut galleries, SortKind::ChapterCount, SortOrder::Desc);
        assert_eq!(ids(&galleries), vec![2, 1, 3]);
    }

    #[test]
    fn adult_and_filtered_galleries_are_hidden_unless_requested() {
        let mut adult = gallery(1, "A", Vec::new());
        adult.manga = Some(manga(&["Hentai", "Drama"]));
        let mut filtered = gallery(2, "B", Vec::new());
        filtered.filtered = Some(true);
        let plain = gallery(3, "C", Vec::new());
        let galleries = vec![adult, filtered, plain];
        let tags = vec!["hentai".to_string()];

        let visible: Vec<u64> = visible_galleries(&galleries, &tags, false)
            .iter()
            .map(|gallery| gallery.id)
            .collect();
        assert_eq!(visible, vec![3]);
        assert_eq!(visible_galleries(&galleries, &tags, true).len(), 3);
    }

    #[test]
    fn reading_order_compares_numbers_numerically() {
        let unordered = gallery(
            1,
            "A",
            vec![
                chapter("Chapter-10", false),
                chapter("Chapter-2", false),
                chapter("chapter-1", false),
            ],
        );
        let names: Vec<&str> = chapters_in_reading_order(&unordered)
            .iter()
            .map(|chapter| chapter.name.as_str())
            .collect();
        assert_eq!(names, vec!["chapter-1", "Chapter-2", "Chapter-10"]);
    }

    fn ids(galleries: &[Gallery]) -> Vec<u64> {
        galleries.iter().map(|gallery| gallery.id).collect()
    }
}
