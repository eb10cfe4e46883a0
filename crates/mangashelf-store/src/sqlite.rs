//! `SQLite` implementation of [`KeyValueStore`].

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::{KvError, KvResult};
use crate::kv::KeyValueStore;

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS key_value (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    )
";

const SELECT_VALUE: &str = r"SELECT value FROM key_value WHERE key = ?";

const UPSERT_VALUE: &str = r"
    INSERT INTO key_value (key, value) VALUES (?, ?)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value
";

const DELETE_VALUE: &str = r"DELETE FROM key_value WHERE key = ?";

const DELETE_ALL: &str = r"DELETE FROM key_value";

/// Maximum number of bound keys per `IN (...)` lookup.
const MULTI_GET_CHUNK: usize = 500;

/// Key-value store persisted in a single `SQLite` table.
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Wrap an existing pool, creating the table when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn new(pool: SqlitePool) -> KvResult<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|source| KvError::query("create_table", source))?;
        Ok(Self { pool })
    }

    /// Open (or create) the database at `url`.
    ///
    /// In-memory URLs are pinned to a single long-lived connection so every
    /// query sees the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be opened.
    pub async fn connect(url: &str) -> KvResult<Self> {
        Self::new(connect_pool(url).await?).await
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Build a pool for `url`, creating the database file when missing.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the database cannot be opened.
pub async fn connect_pool(url: &str) -> KvResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|source| KvError::query("parse_url", source))?
        .create_if_missing(true);
    let in_memory = url.contains(":memory:");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };
    pool_options
        .connect_with(options)
        .await
        .map_err(|source| KvError::query("connect", source))
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let row = sqlx::query(SELECT_VALUE)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| KvError::query("get", source))?;
        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(|source| KvError::query("get", source))
    }

    async fn set(&self, key: &str, value: &str) -> KvResult<()> {
        sqlx::query(UPSERT_VALUE)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|source| KvError::query("set", source))?;
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> KvResult<Vec<(String, Option<String>)>> {
        let mut found = HashMap::with_capacity(keys.len());
        for chunk in keys.chunks(MULTI_GET_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT key, value FROM key_value WHERE key IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for key in chunk {
                query = query.bind(key.as_str());
            }
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|source| KvError::query("multi_get", source))?;
            for row in rows {
                let key: String = row
                    .try_get("key")
                    .map_err(|source| KvError::query("multi_get", source))?;
                let value: String = row
                    .try_get("value")
                    .map_err(|source| KvError::query("multi_get", source))?;
                found.insert(key, value);
            }
        }
        Ok(keys
            .iter()
            .map(|key| (key.clone(), found.get(key).cloned()))
            .collect())
    }

    async fn multi_set(&self, entries: &[(String, String)]) -> KvResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| KvError::query("multi_set", source))?;
        for (key, value) in entries {
            sqlx::query(UPSERT_VALUE)
                .bind(key.as_str())
                .bind(value.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|source| KvError::query("multi_set", source))?;
        }
        tx.commit()
            .await
            .map_err(|source| KvError::query("multi_set", source))
    }

    async fn remove_item(&self, key: &str) -> KvResult<()> {
        sqlx::query(DELETE_VALUE)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|source| KvError::query("remove_item", source))?;
        Ok(())
    }

    async fn clear(&self) -> KvResult<()> {
        sqlx::query(DELETE_ALL)
            .execute(&self.pool)
            .await
            .map_err(|source| KvError::query("clear", source))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> KvResult<SqliteKeyValueStore> {
        SqliteKeyValueStore::connect("sqlite::memory:").await
    }

    #[tokio::test]
    async fn set_overwrites_existing_value() -> anyhow::Result<()> {
        let store = memory_store().await?;
        store.set("serverUrl", "http://a").await?;
        store.set("serverUrl", "http://b").await?;
        assert_eq!(store.get("serverUrl").await?.as_deref(), Some("http://b"));
        assert_eq!(store.get("missing").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn multi_get_returns_requested_order() -> anyhow::Result<()> {
        let store = memory_store().await?;
        store
            .multi_set(&[
                ("galleries-1".into(), "{}".into()),
                ("galleries-2".into(), "[]".into()),
            ])
            .await?;
        let values = store
            .multi_get(&[
                "galleries-2".into(),
                "galleries-3".into(),
                "galleries-1".into(),
            ])
            .await?;
        assert_eq!(values[0].1.as_deref(), Some("[]"));
        assert_eq!(values[1].1, None);
        assert_eq!(values[2].1.as_deref(), Some("{}"));
        Ok(())
    }

    #[tokio::test]
    async fn file_database_survives_reconnect() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}", dir.path().join("kv.db").display());
        {
            let store = SqliteKeyValueStore::connect(&url).await?;
            store.set("galleriesIndex", r#"{"lastId":0,"collection":[]}"#).await?;
            store.pool().close().await;
        }
        let reopened = SqliteKeyValueStore::connect(&url).await?;
        assert!(reopened.get("galleriesIndex").await?.is_some());
        reopened.remove_item("galleriesIndex").await?;
        assert!(reopened.get("galleriesIndex").await?.is_none());
        reopened.clear().await?;
        Ok(())
    }
}
