//! Persisted rows of the background download queue.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use crate::error::{DownloadError, DownloadResult};

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS download_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        error INTEGER NOT NULL DEFAULT 0,
        page_path TEXT NOT NULL,
        target_path TEXT NOT NULL,
        api_url TEXT NOT NULL
    )
";

const INSERT_ITEM: &str = r"
    INSERT INTO download_queue (error, page_path, target_path, api_url)
    VALUES (0, ?, ?, ?)
";

const SELECT_BY_ERROR: &str = r"
    SELECT id, error, page_path, target_path, api_url
    FROM download_queue
    WHERE error = ?
    ORDER BY id
";

const DELETE_ITEM: &str = r"DELETE FROM download_queue WHERE id = ?";

const FLAG_ITEM: &str = r"UPDATE download_queue SET error = 1 WHERE id = ?";

const RESET_FAILED: &str = r"UPDATE download_queue SET error = 0 WHERE error = 1";

/// One page waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    /// Row identifier.
    pub id: i64,
    /// Whether the last transfer attempt failed.
    pub error: bool,
    /// Remote page path passed to the download endpoint.
    pub page_path: String,
    /// Destination relative to the library root.
    pub target_path: String,
    /// Local API base URL serving the page.
    pub api_url: String,
}

/// Row to insert into the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueueItem {
    /// Remote page path passed to the download endpoint.
    pub page_path: String,
    /// Destination relative to the library root.
    pub target_path: String,
    /// Local API base URL serving the page.
    pub api_url: String,
}

/// Storage behind the background queue.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append rows and return their ids in insertion order.
    async fn enqueue(&self, items: &[NewQueueItem]) -> DownloadResult<Vec<i64>>;

    /// Rows without the error flag, oldest first.
    async fn pending(&self) -> DownloadResult<Vec<QueueItem>>;

    /// Rows with the error flag, oldest first.
    async fn failed(&self) -> DownloadResult<Vec<QueueItem>>;

    /// Drop a transferred row.
    async fn complete(&self, id: i64) -> DownloadResult<()>;

    /// Flag a row whose transfer failed so refills skip it.
    async fn mark_failed(&self, id: i64) -> DownloadResult<()>;

    /// Clear every error flag and return the number of rows requeued.
    async fn retry_failed(&self) -> DownloadResult<u64>;
}

/// [`QueueStore`] on the `download_queue` `SQLite` table.
#[derive(Clone)]
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    /// Wrap `pool`, creating the table when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn new(pool: SqlitePool) -> DownloadResult<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|source| DownloadError::queue("create_table", source))?;
        Ok(Self { pool })
    }

    async fn select(&self, operation: &'static str, error: bool) -> DownloadResult<Vec<QueueItem>> {
        let rows = sqlx::query(SELECT_BY_ERROR)
            .bind(i64::from(error))
            .fetch_all(&self.pool)
            .await
            .map_err(|source| DownloadError::queue(operation, source))?;
        rows.iter()
            .map(|row| decode_item(row).map_err(|source| DownloadError::queue(operation, source)))
            .collect()
    }
}

fn decode_item(row: &SqliteRow) -> Result<QueueItem, sqlx::Error> {
    Ok(QueueItem {
        id: row.try_get("id")?,
        error: row.try_get::<i64, _>("error")? != 0,
        page_path: row.try_get("page_path")?,
        target_path: row.try_get("target_path")?,
        api_url: row.try_get("api_url")?,
    })
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue(&self, items: &[NewQueueItem]) -> DownloadResult<Vec<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| DownloadError::queue("enqueue_begin", source))?;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let result = sqlx::query(INSERT_ITEM)
                .bind(item.page_path.as_str())
                .bind(item.target_path.as_str())
                .bind(item.api_url.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|source| DownloadError::queue("enqueue", source))?;
            ids.push(result.last_insert_rowid());
        }
        tx.commit()
            .await
            .map_err(|source| DownloadError::queue("enqueue_commit", source))?;
        Ok(ids)
    }

    async fn pending(&self) -> DownloadResult<Vec<QueueItem>> {
        self.select("pending", false).await
    }

    async fn failed(&self) -> DownloadResult<Vec<QueueItem>> {
        self.select("failed", true).await
    }

    async fn complete(&self, id: i64) -> DownloadResult<()> {
        sqlx::query(DELETE_ITEM)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|source| DownloadError::queue("complete", source))?;
        Ok(())
    }

    async fn mark_failed(&self, id: i64) -> DownloadResult<()> {
        sqlx::query(FLAG_ITEM)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|source| DownloadError::queue("mark_failed", source))?;
        Ok(())
    }

    async fn retry_failed(&self) -> DownloadResult<u64> {
        let result = sqlx::query(RESET_FAILED)
            .execute(&self.pool)
            .await
            .map_err(|source| DownloadError::queue("retry_failed", source))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> anyhow::Result<SqliteQueueStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(SqliteQueueStore::new(pool).await?)
    }

    fn item(page: &str) -> NewQueueItem {
        NewQueueItem {
            page_path: format!("Test Manga/Chapter-1/{page}"),
            target_path: format!("test-manga/chapter-1/{page}"),
            api_url: "http://x".into(),
        }
    }

    #[tokio::test]
    async fn failed_rows_leave_pending_until_retried() -> anyhow::Result<()> {
        let store = store().await?;
        let ids = store.enqueue(&[item("01.png"), item("02.png"), item("03.png")]).await?;
        assert_eq!(ids.len(), 3);

        store.complete(ids[0]).await?;
        store.mark_failed(ids[1]).await?;

        let pending = store.pending().await?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[2]);
        let failed = store.failed().await?;
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error);
        assert_eq!(failed[0].target_path, "test-manga/chapter-1/02.png");

        assert_eq!(store.retry_failed().await?, 1);
        let pending: Vec<i64> = store.pending().await?.iter().map(|item| item.id).collect();
        assert_eq!(pending, vec![ids[1], ids[2]]);
        Ok(())
    }
}
