//! [`FileSystem`] backed by the local disk and an HTTP client.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::FileSystem;
use crate::error::{FsOpsError, FsOpsResult};

/// Local filesystem with streamed HTTP downloads.
#[derive(Clone, Default)]
pub struct LocalFileSystem {
    client: Client,
}

impl LocalFileSystem {
    /// Build a filesystem that downloads through `client`.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        url: &str,
        destination: &Path,
    ) -> FsOpsResult<()> {
        let mut file = fs::File::create(destination)
            .await
            .map_err(|source| FsOpsError::io("download_create", destination, source))?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| FsOpsError::http("download_body", url, source))?;
            file.write_all(&chunk)
                .await
                .map_err(|source| FsOpsError::io("download_write", destination, source))?;
        }
        file.flush()
            .await
            .map_err(|source| FsOpsError::io("download_flush", destination, source))
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &Path) -> FsOpsResult<bool> {
        fs::try_exists(path)
            .await
            .map_err(|source| FsOpsError::io("exists", path, source))
    }

    async fn make_directory(&self, path: &Path, intermediates: bool) -> FsOpsResult<()> {
        let result = if intermediates {
            fs::create_dir_all(path).await
        } else {
            fs::create_dir(path).await
        };
        match result {
            Err(err) if err.kind() != ErrorKind::AlreadyExists => {
                Err(FsOpsError::io("make_directory", path, err))
            }
            _ => Ok(()),
        }
    }

    async fn download(&self, url: &str, destination: &Path) -> FsOpsResult<u16> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FsOpsError::http("download_request", url, source))?;
        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "download rejected by server");
            return Ok(status.as_u16());
        }

        if let Err(err) = self.stream_to_file(response, url, destination).await {
            if let Err(cleanup) = fs::remove_file(destination).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(path = %destination.display(), error = %cleanup, "partial download left behind");
            }
            return Err(err);
        }
        Ok(status.as_u16())
    }

    async fn delete(&self, path: &Path) -> FsOpsResult<()> {
        let metadata = match fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(FsOpsError::io("delete_stat", path, err)),
        };
        let result = if metadata.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        match result {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                Err(FsOpsError::io("delete", path, err))
            }
            _ => Ok(()),
        }
    }
}
