//! Local library browsing and reading state.

use mangashelf_library::{Gallery, sort_galleries, visible_galleries};

use crate::cli::{ChapterSelectArgs, GalleryArgs, ListArgs, MarkReadArgs, PageArgs};
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{render_chapters, render_galleries, render_gallery};

pub(crate) fn handle_list(ctx: &AppContext, args: &ListArgs) -> CliResult<()> {
    let mut galleries: Vec<Gallery> = ctx.library.galleries().as_ref().clone();
    sort_galleries(&mut galleries, args.sort.into(), args.order.into());
    let visible = visible_galleries(&galleries, &ctx.config.adult_tags, args.show_adult);
    print!("{}", render_galleries(&visible, ctx.output)?);
    Ok(())
}

pub(crate) fn handle_show(ctx: &AppContext, args: &GalleryArgs) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    print!("{}", render_gallery(&gallery, ctx.output)?);
    Ok(())
}

pub(crate) fn handle_chapters(ctx: &AppContext, args: &GalleryArgs) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    print!("{}", render_chapters(&gallery, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_mark_read(ctx: &AppContext, args: &MarkReadArgs) -> CliResult<()> {
    let gallery = mark_read(ctx, args).await?;
    let read = gallery.chapters.iter().filter(|chapter| chapter.read).count();
    println!("{}: {read}/{} chapters read", gallery.name, gallery.chapters.len());
    Ok(())
}

async fn mark_read(ctx: &AppContext, args: &MarkReadArgs) -> CliResult<Gallery> {
    let gallery = ctx.gallery(&args.gallery)?;
    if let Some(index) = args.index {
        return Ok(ctx.library.mark_chapter_read(gallery.id, index).await?);
    }
    require_chapters(&gallery, &args.chapters)?;
    Ok(ctx.library.bulk_mark_read(gallery.id, &args.chapters).await?)
}

pub(crate) async fn handle_page(ctx: &AppContext, args: &PageArgs) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    ctx.library
        .update_current_page(gallery.id, &args.chapter, args.page)
        .await?;
    ctx.library.update_last_read_at(gallery.id).await?;
    println!("{} / {}: page {}", gallery.name, args.chapter, args.page);
    Ok(())
}

pub(crate) async fn handle_remove_chapters(
    ctx: &AppContext,
    args: &ChapterSelectArgs,
) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    require_chapters(&gallery, &args.chapters)?;
    let updated = ctx.library.bulk_delete(gallery.id, &args.chapters).await?;
    println!(
        "{}: removed {} chapters, {} left",
        updated.name,
        args.chapters.len(),
        updated.chapters.len()
    );
    Ok(())
}

pub(crate) async fn handle_remove(ctx: &AppContext, args: &GalleryArgs) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    ctx.library.delete_gallery(gallery.id).await?;
    println!("{} removed", gallery.name);
    Ok(())
}

pub(crate) async fn handle_filter(ctx: &AppContext, args: &GalleryArgs, filtered: bool) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    ctx.library.set_filtered(gallery.id, filtered).await?;
    println!("{} {}", gallery.name, if filtered { "hidden" } else { "visible" });
    Ok(())
}

fn require_chapters(gallery: &Gallery, names: &[String]) -> CliResult<()> {
    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| !gallery.chapters.iter().any(|chapter| chapter.name == **name))
        .map(String::as_str)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CliError::validation(format!(
            "'{}' has no chapters named: {}",
            gallery.name,
            unknown.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use mangashelf_library::GalleryDraft;
    use mangashelf_test_support::fixtures::sample_listing;

    async fn seeded() -> anyhow::Result<(AppContext, tempfile::TempDir, Gallery)> {
        let (ctx, root) = test_context(None).await?;
        let gallery = ctx
            .library
            .upsert(GalleryDraft::from_listing(&sample_listing(), None))
            .await?;
        Ok((ctx, root, gallery))
    }

    fn mark_args(chapters: &[&str], index: Option<usize>) -> MarkReadArgs {
        MarkReadArgs {
            gallery: "Test Manga".into(),
            chapters: chapters.iter().map(ToString::to_string).collect(),
            index,
        }
    }

    #[tokio::test]
    async fn chapters_are_marked_by_name_or_position() -> anyhow::Result<()> {
        let (ctx, _root, _) = seeded().await?;

        let gallery = mark_read(&ctx, &mark_args(&["Chapter-2"], None))
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(!gallery.chapters[0].read);
        assert!(gallery.chapters[1].read);
        assert!(gallery.last_read_at.is_some());

        let gallery = mark_read(&ctx, &mark_args(&[], Some(0)))
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(gallery.chapters.iter().all(|chapter| chapter.read));

        let out_of_range = mark_read(&ctx, &mark_args(&[], Some(5))).await;
        assert!(matches!(out_of_range, Err(err) if err.exit_code() == 2));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_names_are_rejected_without_changes() -> anyhow::Result<()> {
        let (ctx, _root, gallery) = seeded().await?;

        let result = mark_read(&ctx, &mark_args(&["Chapter-1", "Chapter-7"], None)).await;

        assert!(matches!(result, Err(err) if err.exit_code() == 2));
        assert_eq!(ctx.library.get(gallery.id)?, gallery);
        Ok(())
    }

    #[tokio::test]
    async fn page_position_is_bounded_by_the_chapter() -> anyhow::Result<()> {
        let (ctx, _root, gallery) = seeded().await?;
        let page = |page| PageArgs {
            gallery: "Test Manga".into(),
            chapter: "Chapter-1".into(),
            page,
        };

        handle_page(&ctx, &page(2))
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        let stored = ctx.library.get(gallery.id)?;
        assert_eq!(stored.chapters[0].current_page, 2);
        assert!(stored.last_read_at.is_some());

        assert!(matches!(handle_page(&ctx, &page(3)).await, Err(err) if err.exit_code() == 2));
        Ok(())
    }

    #[tokio::test]
    async fn removing_chapters_and_galleries_updates_the_library() -> anyhow::Result<()> {
        let (ctx, _root, gallery) = seeded().await?;
        let chapter_dir = ctx.library.chapter_dir(&gallery.path, "chapter-1")?;
        tokio::fs::create_dir_all(&chapter_dir).await?;

        handle_remove_chapters(
            &ctx,
            &ChapterSelectArgs {
                gallery: "Test Manga".into(),
                chapters: vec!["Chapter-1".into()],
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(!chapter_dir.exists());
        assert_eq!(ctx.library.get(gallery.id)?.chapters.len(), 1);

        let args = GalleryArgs {
            gallery: "Test Manga".into(),
        };
        handle_remove(&ctx, &args)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(ctx.library.galleries().is_empty());
        assert!(matches!(handle_show(&ctx, &args), Err(err) if err.exit_code() == 2));
        Ok(())
    }

    #[tokio::test]
    async fn hidden_galleries_are_persisted() -> anyhow::Result<()> {
        let (ctx, _root, gallery) = seeded().await?;
        let args = GalleryArgs {
            gallery: "Test Manga".into(),
        };

        handle_filter(&ctx, &args, true)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        let galleries = ctx.library.galleries();
        assert!(visible_galleries(&galleries, &[], false).is_empty());
        assert_eq!(ctx.library.get(gallery.id)?.filtered, Some(true));

        handle_filter(&ctx, &args, false)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(ctx.library.galleries().len(), 1);
        assert!(!ctx.library.get(gallery.id)?.is_filtered());
        Ok(())
    }
}
