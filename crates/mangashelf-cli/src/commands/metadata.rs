//! Gallery metadata lookups.

use mangashelf_remote::enrich_library;

use crate::cli::{GalleryArgs, MetaFetchArgs};
use crate::context::{AppContext, CliResult};
use crate::output::{render_enrich, render_gallery};

pub(crate) async fn handle_fetch(ctx: &AppContext, args: &MetaFetchArgs) -> CliResult<()> {
    let client = ctx.metadata_client()?;
    let Some(name) = &args.gallery else {
        let report = enrich_library(&ctx.library, &client).await;
        print!("{}", render_enrich(&report, ctx.output)?);
        return Ok(());
    };

    let gallery = ctx.gallery(name)?;
    match client.search(&gallery.name).await? {
        Some(manga) => {
            let updated = ctx.library.set_manga(gallery.id, manga).await?;
            print!("{}", render_gallery(&updated, ctx.output)?);
        }
        None => println!("no metadata found for {}", gallery.name),
    }
    Ok(())
}

pub(crate) async fn handle_clear(ctx: &AppContext, args: &GalleryArgs) -> CliResult<()> {
    let gallery = ctx.gallery(&args.gallery)?;
    ctx.library.clear_manga(gallery.id).await?;
    println!("metadata cleared for {}", gallery.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::test_context;
    use httpmock::prelude::*;
    use mangashelf_library::GalleryDraft;
    use mangashelf_test_support::fixtures::sample_listing;
    use serde_json::json;

    #[tokio::test]
    async fn single_gallery_fetch_attaches_and_clears_metadata() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "data": {
                        "Media": {
                            "id": 42,
                            "title": {"english": "Test Manga", "romaji": null},
                            "coverImage": {},
                            "genres": ["Drama"],
                            "synonyms": []
                        }
                    }
                }));
        });
        let (mut ctx, _root) = test_context(None).await?;
        ctx.config.metadata_url = server.url("/");
        let gallery = ctx
            .library
            .upsert(GalleryDraft::from_listing(&sample_listing(), None))
            .await?;
        let args = MetaFetchArgs {
            gallery: Some("Test Manga".into()),
        };

        handle_fetch(&ctx, &args)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        mock.assert();
        let stored = ctx.library.get(gallery.id)?;
        assert_eq!(stored.manga.map(|manga| manga.id), Some(42));

        handle_clear(
            &ctx,
            &GalleryArgs {
                gallery: "Test Manga".into(),
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert!(ctx.library.get(gallery.id)?.manga.is_none());
        Ok(())
    }
}
