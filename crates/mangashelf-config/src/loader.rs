//! Environment parsing for [`AppConfig`].
//!
//! # Design
//! - Every variable is optional; unset or blank values keep the default.
//! - Values are validated here so later layers can trust the typed config.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mangashelf_telemetry::LogFormat;
use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

const SERVER_URL: &str = "MANGASHELF_SERVER_URL";
const LIBRARY_ROOT: &str = "MANGASHELF_LIBRARY_ROOT";
const DATABASE_URL: &str = "MANGASHELF_DATABASE_URL";
const LOG_LEVEL: &str = "MANGASHELF_LOG_LEVEL";
const LOG_FORMAT: &str = "MANGASHELF_LOG_FORMAT";
const BATCH_SIZE: &str = "MANGASHELF_BATCH_SIZE";
const RETRY_BUDGET: &str = "MANGASHELF_RETRY_BUDGET";
const QUEUE_DELAY_MS: &str = "MANGASHELF_QUEUE_DELAY_MS";
const METADATA_URL: &str = "MANGASHELF_METADATA_URL";
const ADULT_TAGS: &str = "MANGASHELF_ADULT_TAGS";
const HTTP_TIMEOUT_SECS: &str = "MANGASHELF_HTTP_TIMEOUT_SECS";

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first unusable variable.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for the first unusable variable.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(value) = read(SERVER_URL) {
            config.server_url = Some(parse_http_url(SERVER_URL, &value)?);
        }
        if let Some(value) = read(LIBRARY_ROOT) {
            config.library_root = PathBuf::from(value);
        }
        if let Some(value) = read(DATABASE_URL) {
            if !value.starts_with("sqlite:") {
                return Err(ConfigError::invalid(
                    DATABASE_URL,
                    &value,
                    "expected a sqlite: URL",
                ));
            }
            config.database_url = value;
        }
        if let Some(value) = read(LOG_LEVEL) {
            config.log_level = value;
        }
        if let Some(value) = read(LOG_FORMAT) {
            config.log_format = LogFormat::from_name(&value).ok_or_else(|| {
                ConfigError::invalid(LOG_FORMAT, &value, "expected json or pretty")
            })?;
        }
        if let Some(value) = read(BATCH_SIZE) {
            config.batch_size = parse_positive(BATCH_SIZE, &value)?;
        }
        if let Some(value) = read(RETRY_BUDGET) {
            config.retry_budget = parse_positive(RETRY_BUDGET, &value)?;
        }
        if let Some(value) = read(QUEUE_DELAY_MS) {
            config.queue_delay = Duration::from_millis(parse_number(QUEUE_DELAY_MS, &value)?);
        }
        if let Some(value) = read(METADATA_URL) {
            config.metadata_url = parse_http_url(METADATA_URL, &value)?;
        }
        if let Some(value) = read(ADULT_TAGS) {
            config.adult_tags = value
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(value) = read(HTTP_TIMEOUT_SECS) {
            let secs: u64 = parse_positive(HTTP_TIMEOUT_SECS, &value)?;
            config.http_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Validate an `http` or `https` URL and return it unchanged.
pub(crate) fn parse_http_url(field: &'static str, value: &str) -> ConfigResult<String> {
    let url =
        Url::parse(value).map_err(|_| ConfigError::invalid(field, value, "expected a URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(field, value, "expected http or https"));
    }
    Ok(value.to_string())
}

fn parse_number<T: FromStr>(field: &'static str, value: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "expected a non-negative integer"))
}

fn parse_positive<T: FromStr + Default + PartialEq>(
    field: &'static str,
    value: &str,
) -> ConfigResult<T> {
    let parsed: T = parse_number(field, value)?;
    if parsed == T::default() {
        return Err(ConfigError::invalid(field, value, "must be at least 1"));
    }
    Ok(parsed)
}
