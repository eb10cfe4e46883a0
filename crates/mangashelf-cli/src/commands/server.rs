//! Saved Local API server address.

use crate::cli::ServerSetArgs;
use crate::context::{AppContext, CliResult};

pub(crate) async fn handle_set(ctx: &AppContext, args: &ServerSetArgs) -> CliResult<()> {
    let url = ctx.settings.set_server_url(&args.url).await?;
    println!("server url saved: {url}");
    Ok(())
}

pub(crate) async fn handle_show(ctx: &AppContext) -> CliResult<()> {
    println!("{}", describe_server(ctx).await?);
    Ok(())
}

pub(crate) async fn handle_clear(ctx: &AppContext) -> CliResult<()> {
    ctx.settings.clear_server_url().await?;
    println!("saved server url cleared");
    Ok(())
}

async fn describe_server(ctx: &AppContext) -> CliResult<String> {
    if let Some(url) = &ctx.config.server_url {
        return Ok(format!("server url: {url} (override)"));
    }
    Ok(match ctx.settings.server_url().await? {
        Some(url) => format!("server url: {url} (saved)"),
        None => "server url: not set".to_string(),
    })
}
