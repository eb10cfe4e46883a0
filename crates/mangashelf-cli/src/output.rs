//! Output renderers and formatting helpers for CLI commands.
//!
//! Renderers return the text to print so handlers stay the only place that
//! writes to stdout.

use anyhow::anyhow;
use mangashelf_download::QueueItem;
use mangashelf_library::{
    Gallery, LocalApiData, LocalApiResponse, chapters_in_reading_order, gallery_detail,
    last_read_chapter,
};
use mangashelf_remote::EnrichReport;
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::context::{CliError, CliResult};

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn render_galleries(galleries: &[&Gallery], format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(galleries);
    }
    let mut out = format!("{:<40} {:>8} {:>6} {:<25} CONTINUE\n", "NAME", "CHAPTERS", "READ", "LAST READ");
    for gallery in galleries {
        let read = gallery.chapters.iter().filter(|chapter| chapter.read).count();
        let next = last_read_chapter(gallery).map_or("-", |chapter| chapter.name.as_str());
        out.push_str(&format!(
            "{:<40} {:>8} {:>6} {:<25} {}\n",
            gallery.name,
            gallery.chapters.len(),
            read,
            format_last_read(gallery),
            next
        ));
    }
    Ok(out)
}

pub(crate) fn render_gallery(gallery: &Gallery, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(gallery);
    }
    let read = gallery.chapters.iter().filter(|chapter| chapter.read).count();
    let mut out = format!("id: {}\nname: {}\npath: {}\n", gallery.id, gallery.name, gallery.path);
    out.push_str(&format!(
        "chapters: {} ({read} read)\npages: {}\nlast read: {}\n",
        gallery.chapters.len(),
        gallery.files_count,
        format_last_read(gallery)
    ));
    if gallery.is_filtered() {
        out.push_str("hidden: yes\n");
    }
    if let Some(manga) = &gallery.manga {
        if let Some(title) = manga.title.english.as_ref().or(manga.title.romaji.as_ref()) {
            out.push_str(&format!("title: {title}\n"));
        }
        if !manga.genres.is_empty() {
            out.push_str(&format!("genres: {}\n", manga.genres.join(", ")));
        }
    }
    let detail = gallery_detail(gallery);
    if !detail.is_empty() {
        out.push('\n');
        out.push_str(&detail);
        out.push('\n');
    }
    Ok(out)
}

pub(crate) fn render_chapters(gallery: &Gallery, format: OutputFormat) -> CliResult<String> {
    let ordered = chapters_in_reading_order(gallery);
    if format == OutputFormat::Json {
        return to_json(&ordered);
    }
    let mut out = format!("{:<4} {:>9} NAME\n", "READ", "PAGE");
    for chapter in ordered {
        let marker = if chapter.read { "x" } else { "-" };
        out.push_str(&format!(
            "{:<4} {:>9} {}\n",
            marker,
            format!("{}/{}", chapter.current_page, chapter.pages.len()),
            chapter.name
        ));
    }
    Ok(out)
}

pub(crate) fn render_listing(listing: &LocalApiResponse, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(listing);
    }
    let mut out = format!("{:<40} {:>8} {:>6}\n", "NAME", "CHAPTERS", "PAGES");
    for gallery in &listing.data {
        out.push_str(&format!(
            "{:<40} {:>8} {:>6}\n",
            gallery.name,
            gallery.files.len(),
            page_count(gallery)
        ));
    }
    out.push_str(&format!("{} galleries\n", listing.count));
    Ok(out)
}

pub(crate) fn render_remote_gallery(gallery: &LocalApiData, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(gallery);
    }
    let mut out = format!("name: {}\npath: {}\n", gallery.name, gallery.full_path);
    for chapter in &gallery.files {
        out.push_str(&format!("  {:<30} {:>4} pages\n", chapter.name, chapter.files.len()));
    }
    Ok(out)
}

pub(crate) fn render_queue(pending: &[QueueItem], failed: &[QueueItem], format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(&json!({ "pending": pending, "failed": failed }));
    }
    let mut out = format!("pending: {}\nfailed: {}\n", pending.len(), failed.len());
    for item in failed {
        out.push_str(&format!("  failed #{} {}\n", item.id, item.page_path));
    }
    Ok(out)
}

pub(crate) fn render_enrich(report: &EnrichReport, format: OutputFormat) -> CliResult<String> {
    if format == OutputFormat::Json {
        return to_json(report);
    }
    Ok(format!(
        "updated: {}\nunmatched: {}\nfailed: {}\n",
        report.updated, report.unmatched, report.failed
    ))
}

fn page_count(gallery: &LocalApiData) -> usize {
    gallery.files.iter().map(|chapter| chapter.files.len()).sum()
}

fn format_last_read(gallery: &Gallery) -> String {
    gallery
        .last_read_at
        .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangashelf_library::Chapter;

    fn gallery() -> Gallery {
        let chapter = |name: &str, read: bool| Chapter {
            name: name.into(),
            path: name.to_lowercase(),
            pages: vec!["01.png".into(), "02.png".into()],
            read,
            current_page: usize::from(read),
        };
        Gallery {
            id: 7,
            name: "Test Manga".into(),
            path: "test-manga".into(),
            dirs_count: 3,
            files_count: 6,
            last_read_at: None,
            chapters: vec![
                chapter("Chapter-10", false),
                chapter("Chapter-2", true),
                chapter("Chapter-1", true),
            ],
            manga: None,
            filtered: None,
        }
    }

    #[test]
    fn chapter_table_follows_reading_order() -> anyhow::Result<()> {
        let text = render_chapters(&gallery(), OutputFormat::Table)
            .map_err(|err| anyhow!(err.display_message()))?;
        let names: Vec<&str> = text
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().last())
            .collect();
        assert_eq!(names, vec!["Chapter-1", "Chapter-2", "Chapter-10"]);
        assert!(text.contains("1/2"));
        Ok(())
    }

    #[test]
    fn gallery_table_shows_continue_point() -> anyhow::Result<()> {
        let gallery = gallery();
        let text = render_galleries(&[&gallery], OutputFormat::Table)
            .map_err(|err| anyhow!(err.display_message()))?;
        let row = text.lines().nth(1).unwrap_or_default();
        assert!(row.starts_with("Test Manga"));
        assert!(row.contains("never"));
        assert!(row.ends_with("Chapter-10"));
        Ok(())
    }

    #[test]
    fn json_output_uses_persisted_field_names() -> anyhow::Result<()> {
        let text = render_gallery(&gallery(), OutputFormat::Json)
            .map_err(|err| anyhow!(err.display_message()))?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(value["filesCount"], 6);
        assert_eq!(value["chapters"][1]["currentPage"], 1);
        Ok(())
    }
}
