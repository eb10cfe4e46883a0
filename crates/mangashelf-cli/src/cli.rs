//! Argument parsing and command dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use mangashelf_config::AppConfig;
use mangashelf_library::{SortKind, SortOrder};
use mangashelf_telemetry::{LoggingConfig, init_logging};
use reqwest::Url;

use crate::commands::{download, library, metadata, queue, remote, server};
use crate::context::{AppContext, CliError, CliResult};

const BUILD_SHA: &str = match option_env!("MANGASHELF_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(url) = cli.server_url {
        config.server_url = Some(url);
    }
    init_logging(&LoggingConfig {
        level: &config.log_level,
        format: config.log_format,
        build_sha: BUILD_SHA,
    })
    .map_err(CliError::failure)?;

    let ctx = AppContext::open(config, cli.output).await?;
    dispatch(&ctx, cli.command).await
}

pub(crate) async fn dispatch(ctx: &AppContext, command: Command) -> CliResult<()> {
    match command {
        Command::Server(command) => match command {
            ServerCommand::Set(args) => server::handle_set(ctx, &args).await,
            ServerCommand::Show => server::handle_show(ctx).await,
            ServerCommand::Clear => server::handle_clear(ctx).await,
        },
        Command::Remote(command) => match command {
            RemoteCommand::Ls => remote::handle_list(ctx).await,
            RemoteCommand::Show(args) => remote::handle_show(ctx, &args).await,
        },
        Command::Download(args) => download::handle_download(ctx, &args).await,
        Command::Ls(args) => library::handle_list(ctx, &args),
        Command::Show(args) => library::handle_show(ctx, &args),
        Command::Chapters(args) => library::handle_chapters(ctx, &args),
        Command::MarkRead(args) => library::handle_mark_read(ctx, &args).await,
        Command::Page(args) => library::handle_page(ctx, &args).await,
        Command::RmChapters(args) => library::handle_remove_chapters(ctx, &args).await,
        Command::Rm(args) => library::handle_remove(ctx, &args).await,
        Command::Hide(args) => library::handle_filter(ctx, &args, true).await,
        Command::Unhide(args) => library::handle_filter(ctx, &args, false).await,
        Command::Meta(command) => match command {
            MetaCommand::Fetch(args) => metadata::handle_fetch(ctx, &args).await,
            MetaCommand::Clear(args) => metadata::handle_clear(ctx, &args).await,
        },
        Command::Queue(command) => match command {
            QueueCommand::Add(args) => queue::handle_add(ctx, &args).await,
            QueueCommand::Run => queue::handle_run(ctx).await,
            QueueCommand::Status => queue::handle_status(ctx).await,
            QueueCommand::Retry => queue::handle_retry(ctx).await,
        },
    }
}

#[derive(Parser)]
#[command(name = "mangashelf", about = "Download and read manga served by a Local API server")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        value_parser = parse_url,
        help = "Local API server to use instead of the saved one"
    )]
    pub(crate) server_url: Option<String>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage the saved Local API server.
    #[command(subcommand)]
    Server(ServerCommand),
    /// Browse the Local API server.
    #[command(subcommand)]
    Remote(RemoteCommand),
    /// Download a gallery, or selected chapters of it.
    Download(DownloadArgs),
    /// List local galleries.
    Ls(ListArgs),
    /// Show a local gallery and its metadata.
    Show(GalleryArgs),
    /// List a gallery's chapters in reading order.
    Chapters(GalleryArgs),
    /// Mark chapters as read.
    MarkRead(MarkReadArgs),
    /// Record the page reached in a chapter.
    Page(PageArgs),
    /// Delete chapters from disk and from the gallery.
    RmChapters(ChapterSelectArgs),
    /// Delete a gallery from disk and from the library.
    Rm(GalleryArgs),
    /// Hide a gallery from listings.
    Hide(GalleryArgs),
    /// Show a hidden gallery in listings again.
    Unhide(GalleryArgs),
    /// Manage gallery metadata.
    #[command(subcommand)]
    Meta(MetaCommand),
    /// Manage the background download queue.
    #[command(subcommand)]
    Queue(QueueCommand),
}

#[derive(Subcommand)]
pub(crate) enum ServerCommand {
    Set(ServerSetArgs),
    Show,
    Clear,
}

#[derive(Subcommand)]
pub(crate) enum RemoteCommand {
    Ls,
    Show(GalleryArgs),
}

#[derive(Subcommand)]
pub(crate) enum MetaCommand {
    Fetch(MetaFetchArgs),
    Clear(GalleryArgs),
}

#[derive(Subcommand)]
pub(crate) enum QueueCommand {
    Add(GalleryArgs),
    Run,
    Status,
    Retry,
}

#[derive(Args)]
pub(crate) struct ServerSetArgs {
    pub(crate) url: String,
}

#[derive(Args)]
pub(crate) struct GalleryArgs {
    pub(crate) gallery: String,
}

#[derive(Args)]
pub(crate) struct DownloadArgs {
    pub(crate) gallery: String,
    #[arg(long = "chapter", short = 'c', help = "Chapter to download; repeat for several")]
    pub(crate) chapters: Vec<String>,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    #[arg(long, value_enum, default_value_t = SortArg::Name)]
    pub(crate) sort: SortArg,
    #[arg(long, value_enum, default_value_t = OrderArg::Asc)]
    pub(crate) order: OrderArg,
    #[arg(long, help = "Include hidden galleries and those tagged with adult genres")]
    pub(crate) show_adult: bool,
}

#[derive(Args)]
pub(crate) struct MarkReadArgs {
    pub(crate) gallery: String,
    #[arg(required_unless_present = "index")]
    pub(crate) chapters: Vec<String>,
    #[arg(long, conflicts_with = "chapters", help = "Chapter position in the gallery")]
    pub(crate) index: Option<usize>,
}

#[derive(Args)]
pub(crate) struct PageArgs {
    pub(crate) gallery: String,
    pub(crate) chapter: String,
    pub(crate) page: usize,
}

#[derive(Args)]
pub(crate) struct ChapterSelectArgs {
    pub(crate) gallery: String,
    #[arg(required = true)]
    pub(crate) chapters: Vec<String>,
}

#[derive(Args)]
pub(crate) struct MetaFetchArgs {
    #[arg(help = "Gallery to look up; every gallery without metadata when omitted")]
    pub(crate) gallery: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum SortArg {
    Name,
    LastRead,
    Chapters,
}

impl From<SortArg> for SortKind {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Name => Self::Name,
            SortArg::LastRead => Self::LastRead,
            SortArg::Chapters => Self::ChapterCount,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Asc => Self::Asc,
            OrderArg::Desc => Self::Desc,
        }
    }
}

fn parse_url(input: &str) -> Result<String, String> {
    let url = input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(input.to_string())
    } else {
        Err(format!("invalid URL '{input}': expected http or https"))
    }
}
