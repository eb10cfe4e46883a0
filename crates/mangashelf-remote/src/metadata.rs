//! Client for the AniList GraphQL metadata service.

use mangashelf_library::Manga;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{RemoteError, RemoteResult};

/// Public AniList GraphQL endpoint.
pub const DEFAULT_METADATA_URL: &str = "https://graphql.anilist.co/";

/// Media lookup by title.
pub const MEDIA_QUERY: &str = r"query Manga($search: String!) {
  Media(search: $search, type: MANGA, format: MANGA) {
    id
    idMal
    title {
      english
      romaji
    }
    status
    description
    chapters
    coverImage {
      extraLarge
      large
      medium
      color
    }
    bannerImage
    genres
    synonyms
    averageScore
    favourites
    siteUrl
  }
}";

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    search: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<MediaData>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<Manga>,
}

#[derive(Deserialize)]
struct QueryError {
    message: String,
}

/// Looks up manga metadata by gallery name.
#[derive(Clone, Debug)]
pub struct MetadataClient {
    client: Client,
    endpoint: String,
}

impl MetadataClient {
    /// Client posting queries to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidUrl`] for an unparsable endpoint.
    pub fn new(client: Client, endpoint: &str) -> RemoteResult<Self> {
        let parsed = Url::parse(endpoint.trim()).map_err(|source| RemoteError::InvalidUrl {
            value: endpoint.to_string(),
            source,
        })?;
        Ok(Self {
            client,
            endpoint: parsed.to_string(),
        })
    }

    /// Best match for `search`, or `None` when the service knows no such
    /// title.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, unexpected statuses and query
    /// errors.
    pub async fn search(&self, search: &str) -> RemoteResult<Option<Manga>> {
        let body = QueryBody {
            query: MEDIA_QUERY,
            variables: Variables { search },
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| RemoteError::request("metadata_search", &self.endpoint, source))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(search, "no metadata match");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                operation: "metadata_search",
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|source| RemoteError::request("metadata_body", &self.endpoint, source))?;
        if !payload.errors.is_empty() {
            return Err(RemoteError::Query {
                messages: payload.errors.into_iter().map(|err| err.message).collect(),
            });
        }
        Ok(payload.data.and_then(|data| data.media))
    }
}
