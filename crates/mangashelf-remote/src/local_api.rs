//! Client for the Local API directory listing.

use mangashelf_library::{LocalApiData, LocalApiResponse};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{RemoteError, RemoteResult};

/// Reads gallery listings from a Local API server.
#[derive(Clone, Debug)]
pub struct LocalApiClient {
    client: Client,
    base_url: String,
}

impl LocalApiClient {
    /// Client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] when `base_url` is not an absolute
    /// URL.
    pub fn new(client: Client, base_url: &str) -> RemoteResult<Self> {
        let parsed = Url::parse(base_url.trim()).map_err(|source| RemoteError::InvalidUrl {
            value: base_url.to_string(),
            source,
        })?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Normalised base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the full listing.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails, the server answers with a
    /// failure status or the body is not a listing.
    pub async fn listing(&self) -> RemoteResult<LocalApiResponse> {
        let url = format!("{}/api", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| RemoteError::request("listing", &url, source))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                operation: "listing",
                url,
                status: status.as_u16(),
            });
        }
        let listing: LocalApiResponse = response
            .json()
            .await
            .map_err(|source| RemoteError::request("listing_body", &url, source))?;
        debug!(url = %url, galleries = listing.data.len(), "listing fetched");
        Ok(listing)
    }

    /// Listing entry for the gallery named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the listing cannot be fetched.
    pub async fn gallery(&self, name: &str) -> RemoteResult<Option<LocalApiData>> {
        Ok(self.listing().await?.gallery(name).cloned())
    }
}
