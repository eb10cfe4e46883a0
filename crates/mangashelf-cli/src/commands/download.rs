//! Foreground gallery downloads.

use mangashelf_download::{DownloadProgress, DownloadRequest, StopSignal};
use mangashelf_library::Gallery;
use tracing::info;

use crate::cli::DownloadArgs;
use crate::commands::remote::fetch_remote_gallery;
use crate::context::{AppContext, CliError, CliResult};

pub(crate) async fn handle_download(ctx: &AppContext, args: &DownloadArgs) -> CliResult<()> {
    let gallery = download(ctx, args).await?;
    println!(
        "downloaded {}: {} chapters, {} pages",
        gallery.name, gallery.dirs_count, gallery.files_count
    );
    Ok(())
}

async fn download(ctx: &AppContext, args: &DownloadArgs) -> CliResult<Gallery> {
    let listing = fetch_remote_gallery(ctx, &args.gallery).await?;
    let unknown: Vec<&str> = args
        .chapters
        .iter()
        .filter(|name| !listing.files.iter().any(|chapter| chapter.name == **name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(CliError::validation(format!(
            "unknown chapters for '{}': {}",
            listing.name,
            unknown.join(", ")
        )));
    }

    let base_url = ctx.server_url().await?;
    let pipeline = ctx.pipeline()?;
    let stop = StopSignal::new();
    let interrupt = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping download");
                stop.stop();
            }
        })
    };

    let name = listing.name.clone();
    let mut request = DownloadRequest::new(&base_url, &listing)
        .with_stop(stop)
        .with_progress(move |progress: DownloadProgress| {
            eprintln!("{name}: {}/{} pages", progress.cur, progress.total);
        });
    if !args.chapters.is_empty() {
        request = request.with_chapters(&args.chapters);
    }

    let result = pipeline.download(request).await;
    interrupt.abort();
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use httpmock::prelude::*;
    use mangashelf_test_support::fixtures::{response, sample_listing};

    async fn serve_listing(server: &MockServer) -> anyhow::Result<()> {
        let body = serde_json::to_value(response(vec![sample_listing()]))?;
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body);
        });
        Ok(())
    }

    fn args(chapters: &[&str]) -> DownloadArgs {
        DownloadArgs {
            gallery: "Test Manga".into(),
            chapters: chapters.iter().map(ToString::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn selected_chapter_is_written_under_the_library_root() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        serve_listing(&server).await?;
        let pages = server.mock(|when, then| {
            when.method(GET).path_suffix(".png");
            then.status(200).body("page");
        });
        let (ctx, _root) = test_context(Some(server.base_url())).await?;

        let gallery = download(&ctx, &args(&["Chapter-2"]))
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        pages.assert_hits(2);
        assert_eq!(gallery.chapters.len(), 1);
        assert_eq!(gallery.files_count, 2);
        let page = ctx.library.chapter_dir("test-manga", "chapter-2")?.join("02.png");
        assert_eq!(tokio::fs::read_to_string(page).await?, "page");
        assert!(ctx.library.find_by_name("Test Manga").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_chapter_is_rejected_before_downloading() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        serve_listing(&server).await?;
        let (ctx, _root) = test_context(Some(server.base_url())).await?;

        let result = download(&ctx, &args(&["Chapter-9"])).await;

        assert!(matches!(result, Err(err) if err.exit_code() == 2));
        assert!(ctx.library.galleries().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_pages_leave_no_gallery_behind() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        serve_listing(&server).await?;
        server.mock(|when, then| {
            when.method(GET).path_suffix(".png");
            then.status(500);
        });
        let (ctx, _root) = test_context(Some(server.base_url())).await?;

        let result = download(&ctx, &args(&[])).await;

        assert!(matches!(result, Err(err) if err.exit_code() == 3));
        assert!(ctx.library.galleries().is_empty());
        assert!(!ctx.library.chapter_dir("test-manga", "chapter-1")?.exists());
        assert_eq!(ctx.metrics.snapshot().downloads_failed_total, 1);
        Ok(())
    }
}
