//! Typed process configuration.

use std::path::PathBuf;
use std::time::Duration;

use mangashelf_telemetry::LogFormat;

use crate::defaults;

/// Settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Local API server; falls back to the persisted server setting.
    pub server_url: Option<String>,
    /// Directory holding downloaded galleries.
    pub library_root: PathBuf,
    /// `SQLite` URL for the key-value store and the queue table.
    pub database_url: String,
    /// Log level passed to the subscriber.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Pages transferred concurrently per batch.
    pub batch_size: usize,
    /// Attempts allowed per batch.
    pub retry_budget: usize,
    /// Pause between background queue items.
    pub queue_delay: Duration,
    /// Metadata service endpoint.
    pub metadata_url: String,
    /// Genres hidden unless adult galleries are requested.
    pub adult_tags: Vec<String>,
    /// HTTP client timeout.
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            library_root: PathBuf::from(defaults::LIBRARY_ROOT),
            database_url: defaults::DATABASE_URL.to_string(),
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: LogFormat::infer(),
            batch_size: defaults::BATCH_SIZE,
            retry_budget: defaults::RETRY_BUDGET,
            queue_delay: Duration::from_millis(defaults::QUEUE_DELAY_MS),
            metadata_url: defaults::METADATA_URL.to_string(),
            adult_tags: Vec::new(),
            http_timeout: Duration::from_secs(defaults::HTTP_TIMEOUT_SECS),
        }
    }
}
