//! Browsing the Local API server.

use mangashelf_library::LocalApiData;

use crate::cli::GalleryArgs;
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{render_listing, render_remote_gallery};

pub(crate) async fn handle_list(ctx: &AppContext) -> CliResult<()> {
    let listing = ctx.local_api().await?.listing().await?;
    print!("{}", render_listing(&listing, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_show(ctx: &AppContext, args: &GalleryArgs) -> CliResult<()> {
    let gallery = fetch_remote_gallery(ctx, &args.gallery).await?;
    print!("{}", render_remote_gallery(&gallery, ctx.output)?);
    Ok(())
}

/// Server listing entry for `name`.
pub(crate) async fn fetch_remote_gallery(ctx: &AppContext, name: &str) -> CliResult<LocalApiData> {
    ctx.local_api()
        .await?
        .gallery(name)
        .await?
        .ok_or_else(|| CliError::validation(format!("gallery '{name}' not found on the server")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use httpmock::prelude::*;
    use mangashelf_test_support::fixtures::{response, sample_listing};

    #[tokio::test]
    async fn remote_gallery_lookup_distinguishes_missing_names() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let body = serde_json::to_value(response(vec![sample_listing()]))?;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(body);
        });
        let (ctx, _root) = test_context(Some(server.base_url())).await?;

        let found = fetch_remote_gallery(&ctx, "Test Manga")
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(found.files.len(), 2);

        let missing = fetch_remote_gallery(&ctx, "Other").await;
        assert!(matches!(missing, Err(err) if err.exit_code() == 2));
        mock.assert_hits(2);
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_failures() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(500);
        });
        let (ctx, _root) = test_context(Some(server.base_url())).await?;

        let result = handle_list(&ctx).await;
        assert!(matches!(result, Err(err) if err.exit_code() == 3));
        Ok(())
    }
}
