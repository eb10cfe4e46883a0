//! Background download queue commands.

use mangashelf_download::DownloadQueue;
use tracing::info;

use crate::cli::GalleryArgs;
use crate::commands::remote::fetch_remote_gallery;
use crate::context::{AppContext, CliResult};
use crate::output::render_queue;

pub(crate) async fn handle_add(ctx: &AppContext, args: &GalleryArgs) -> CliResult<()> {
    let listing = fetch_remote_gallery(ctx, &args.gallery).await?;
    let api_url = ctx.server_url().await?;
    let queued = ctx.queue().await?.enqueue_gallery(&listing, &api_url).await?;
    println!("{}: {queued} pages queued", listing.name);
    Ok(())
}

pub(crate) async fn handle_run(ctx: &AppContext) -> CliResult<()> {
    let queue = ctx.queue().await?;
    drain(&queue).await?;
    let failed = queue.failed().await?.len();
    let pending = queue.pending().await?.len();
    println!("queue finished: {pending} pending, {failed} failed");
    Ok(())
}

pub(crate) async fn handle_status(ctx: &AppContext) -> CliResult<()> {
    let queue = ctx.queue().await?;
    let pending = queue.pending().await?;
    let failed = queue.failed().await?;
    print!("{}", render_queue(&pending, &failed, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_retry(ctx: &AppContext) -> CliResult<()> {
    let requeued = ctx.queue().await?.retry_failed().await?;
    println!("{requeued} failed pages requeued");
    Ok(())
}

/// Run the consumer until the queue is idle or the user interrupts it.
async fn drain(queue: &DownloadQueue) -> CliResult<()> {
    let Some(handle) = queue.start().await? else {
        println!("queue is already running");
        return Ok(());
    };
    let stop = handle.stop_signal();
    let join = handle.join();
    tokio::pin!(join);
    tokio::select! {
        () = &mut join => {}
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                info!("interrupt received, stopping queue");
                stop.stop();
            }
            join.await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use httpmock::prelude::*;
    use mangashelf_test_support::fixtures::{response, sample_listing};

    #[tokio::test]
    async fn queued_gallery_is_fetched_through_the_download_endpoint() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let body = serde_json::to_value(response(vec![sample_listing()]))?;
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body);
        });
        let pages = server.mock(|when, then| {
            when.method(GET)
                .path("/download")
                .query_param("file", "Test Manga/Chapter-1/01.png");
            then.status(200).body("first");
        });
        let (ctx, _root) = test_context(Some(server.base_url())).await?;

        handle_add(
            &ctx,
            &GalleryArgs {
                gallery: "Test Manga".into(),
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        let queue = ctx.queue().await.map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(queue.pending().await?.len(), 5);

        drain(&queue)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;

        pages.assert();
        let page = ctx.library.chapter_dir("test-manga", "chapter-1")?.join("01.png");
        assert_eq!(tokio::fs::read_to_string(page).await?, "first");
        assert!(queue.pending().await?.is_empty());
        assert_eq!(queue.failed().await?.len(), 4);

        assert_eq!(queue.retry_failed().await?, 4);
        assert_eq!(queue.pending().await?.len(), 4);
        Ok(())
    }
}
