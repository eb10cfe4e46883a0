//! Shared wiring, errors, and lookups for command handlers.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use mangashelf_config::{AppConfig, ConfigError, ServerSettings};
use mangashelf_download::{
    DownloadError, DownloadPipeline, DownloadQueue, PipelineOptions, SqliteQueueStore,
};
use mangashelf_events::EventBus;
use mangashelf_fsops::{FileSystem, LocalFileSystem};
use mangashelf_library::{Gallery, GalleryLibrary, LibraryError};
use mangashelf_remote::{LocalApiClient, MetadataClient, RemoteError};
use mangashelf_store::{KeyValueStore, SqliteKeyValueStore, connect_pool};
use mangashelf_telemetry::Metrics;
use reqwest::Client;
use sqlx::SqlitePool;

use crate::cli::OutputFormat;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidField {
                field,
                value,
                reason,
            } => Self::validation(match value {
                Some(value) => format!("{field}: {reason} (got '{value}')"),
                None => format!("{field}: {reason}"),
            }),
            other @ ConfigError::Store { .. } => Self::failure(other),
        }
    }
}

impl From<LibraryError> for CliError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::ChapterNotFound { name, .. } => {
                Self::validation(format!("chapter '{name}' not found"))
            }
            LibraryError::ChapterIndexOutOfRange { index, len, .. } => Self::validation(format!(
                "chapter index {index} is out of range (gallery has {len} chapters)"
            )),
            LibraryError::PageOutOfRange {
                chapter, page, len, ..
            } => Self::validation(format!(
                "page {page} is out of range ({chapter} has {len} pages)"
            )),
            other => Self::failure(other),
        }
    }
}

impl From<DownloadError> for CliError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::AlreadyInProgress { gallery } => {
                Self::validation(format!("'{gallery}' is already downloading"))
            }
            DownloadError::InvalidOptions { field, reason } => {
                Self::validation(format!("{field}: {reason}"))
            }
            other => Self::failure(other),
        }
    }
}

impl From<RemoteError> for CliError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::InvalidUrl { value, .. } => {
                Self::validation(format!("invalid URL '{value}'"))
            }
            other => Self::failure(other),
        }
    }
}

/// Services shared by every command handler.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) config: AppConfig,
    pub(crate) output: OutputFormat,
    pub(crate) http: Client,
    pub(crate) pool: SqlitePool,
    pub(crate) library: GalleryLibrary,
    pub(crate) settings: ServerSettings,
    pub(crate) events: EventBus,
    pub(crate) metrics: Metrics,
}

impl AppContext {
    /// Open the database and the library described by `config`.
    pub(crate) async fn open(config: AppConfig, output: OutputFormat) -> CliResult<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        let files = LocalFileSystem::new(http.clone());
        if let Some(parent) = database_parent(&config.database_url) {
            files
                .make_directory(&parent, true)
                .await
                .map_err(|err| failure_with("failed to create data directory", err))?;
        }
        files
            .make_directory(&config.library_root, true)
            .await
            .map_err(|err| failure_with("failed to create library root", err))?;

        let pool = connect_pool(&config.database_url)
            .await
            .map_err(|err| failure_with("failed to open database", err))?;
        let backend: Arc<dyn KeyValueStore> = Arc::new(
            SqliteKeyValueStore::new(pool.clone())
                .await
                .map_err(|err| failure_with("failed to open database", err))?,
        );
        let library =
            GalleryLibrary::open(Arc::clone(&backend), Arc::new(files), &config.library_root)
                .await?;
        let metrics = Metrics::new().map_err(CliError::failure)?;

        Ok(Self {
            settings: ServerSettings::new(backend),
            config,
            output,
            http,
            pool,
            library,
            events: EventBus::new(),
            metrics,
        })
    }

    /// Server URL from the environment or flag, else the saved one.
    pub(crate) async fn server_url(&self) -> CliResult<String> {
        self.settings
            .resolve(self.config.server_url.as_deref())
            .await?
            .ok_or_else(|| {
                CliError::validation(
                    "no server URL configured (pass --server-url or run `mangashelf server set <url>`)",
                )
            })
    }

    pub(crate) async fn local_api(&self) -> CliResult<LocalApiClient> {
        let url = self.server_url().await?;
        Ok(LocalApiClient::new(self.http.clone(), &url)?)
    }

    pub(crate) fn metadata_client(&self) -> CliResult<MetadataClient> {
        Ok(MetadataClient::new(
            self.http.clone(),
            &self.config.metadata_url,
        )?)
    }

    pub(crate) fn pipeline(&self) -> CliResult<DownloadPipeline> {
        let options = PipelineOptions {
            batch_size: self.config.batch_size,
            retry_budget: self.config.retry_budget,
        };
        Ok(DownloadPipeline::new(
            self.library.clone(),
            self.events.clone(),
            self.metrics.clone(),
            options,
        )?)
    }

    pub(crate) async fn queue(&self) -> CliResult<DownloadQueue> {
        let store = SqliteQueueStore::new(self.pool.clone()).await?;
        Ok(DownloadQueue::new(
            Arc::new(store),
            Arc::clone(self.library.files()),
            self.library.root(),
            self.events.clone(),
            self.metrics.clone(),
            self.config.queue_delay,
        ))
    }

    /// Local gallery with `name`.
    pub(crate) fn gallery(&self, name: &str) -> CliResult<Gallery> {
        self.library
            .find_by_name(name)
            .ok_or_else(|| CliError::validation(format!("gallery '{name}' is not in the library")))
    }
}

fn failure_with<E>(context: &'static str, err: E) -> CliError
where
    E: std::error::Error + Send + Sync + 'static,
{
    CliError::failure(anyhow::Error::new(err).context(context))
}

/// Directory holding a file-backed `SQLite` database.
fn database_parent(url: &str) -> Option<PathBuf> {
    if url.contains(":memory:") {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Context over an in-memory database and a temporary library root.
    pub(crate) async fn test_context(server_url: Option<String>) -> anyhow::Result<(AppContext, TempDir)> {
        let root = TempDir::new()?;
        let config = AppConfig {
            server_url,
            library_root: root.path().join("directories"),
            database_url: "sqlite::memory:".into(),
            queue_delay: std::time::Duration::from_millis(1),
            ..AppConfig::default()
        };
        let ctx = AppContext::open(config, OutputFormat::Table)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        Ok((ctx, root))
    }

    #[test]
    fn database_parent_handles_file_and_memory_urls() {
        assert_eq!(
            database_parent("sqlite://./data/mangashelf.db"),
            Some(PathBuf::from("./data"))
        );
        assert_eq!(
            database_parent("sqlite:/var/lib/shelf.db?mode=rwc"),
            Some(PathBuf::from("/var/lib"))
        );
        assert_eq!(database_parent("sqlite::memory:"), None);
        assert_eq!(database_parent("sqlite://shelf.db"), None);
    }

    #[test]
    fn config_errors_are_validation_failures() {
        let err = CliError::from(ConfigError::InvalidField {
            field: "MANGASHELF_BATCH_SIZE",
            value: Some("0".into()),
            reason: "must be at least 1",
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.display_message(),
            "MANGASHELF_BATCH_SIZE: must be at least 1 (got '0')"
        );
    }

    #[tokio::test]
    async fn missing_server_url_is_a_validation_error() -> anyhow::Result<()> {
        let (ctx, _root) = test_context(None).await?;
        let err = ctx.server_url().await.err().ok_or_else(|| anyhow!("expected error"))?;
        assert_eq!(err.exit_code(), 2);

        ctx.settings.set_server_url("http://saved:3000").await?;
        assert!(matches!(ctx.server_url().await, Ok(url) if url == "http://saved:3000"));
        Ok(())
    }
}
