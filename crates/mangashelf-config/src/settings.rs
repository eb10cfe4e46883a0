//! User settings persisted in the key-value store.

use std::sync::Arc;

use mangashelf_store::KeyValueStore;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::parse_http_url;

/// Key holding the saved Local API server URL.
pub const SERVER_URL_KEY: &str = "serverUrl";

/// Saved Local API server address.
#[derive(Clone)]
pub struct ServerSettings {
    store: Arc<dyn KeyValueStore>,
}

impl ServerSettings {
    /// Settings backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The saved server URL, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn server_url(&self) -> ConfigResult<Option<String>> {
        self.store
            .get(SERVER_URL_KEY)
            .await
            .map_err(|source| ConfigError::Store {
                operation: "get_server_url",
                source,
            })
    }

    /// Validate and save `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for a non-http URL, or a store
    /// error if the value cannot be written.
    pub async fn set_server_url(&self, url: &str) -> ConfigResult<String> {
        let url = parse_http_url(SERVER_URL_KEY, url.trim())?;
        self.store
            .set(SERVER_URL_KEY, &url)
            .await
            .map_err(|source| ConfigError::Store {
                operation: "set_server_url",
                source,
            })?;
        info!(server_url = %url, "server url saved");
        Ok(url)
    }

    /// Forget the saved server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn clear_server_url(&self) -> ConfigResult<()> {
        self.store
            .remove_item(SERVER_URL_KEY)
            .await
            .map_err(|source| ConfigError::Store {
                operation: "clear_server_url",
                source,
            })
    }

    /// `explicit` when given, otherwise the saved URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn resolve(&self, explicit: Option<&str>) -> ConfigResult<Option<String>> {
        match explicit {
            Some(url) => Ok(Some(url.to_string())),
            None => self.server_url().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangashelf_store::MemoryKeyValueStore;

    #[tokio::test]
    async fn saved_url_round_trips_and_clears() -> anyhow::Result<()> {
        let settings = ServerSettings::new(Arc::new(MemoryKeyValueStore::new()));
        assert_eq!(settings.server_url().await?, None);

        settings.set_server_url(" http://10.0.0.2:3000 ").await?;
        assert_eq!(settings.server_url().await?.as_deref(), Some("http://10.0.0.2:3000"));
        assert_eq!(
            settings.resolve(Some("http://other")).await?.as_deref(),
            Some("http://other")
        );

        settings.clear_server_url().await?;
        assert_eq!(settings.resolve(None).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_url_is_not_saved() -> anyhow::Result<()> {
        let store = Arc::new(MemoryKeyValueStore::new());
        let settings = ServerSettings::new(store.clone());
        let result = settings.set_server_url("localhost:3000").await;
        assert!(matches!(result, Err(ConfigError::InvalidField { .. })));
        assert!(store.keys().is_empty());
        Ok(())
    }
}
