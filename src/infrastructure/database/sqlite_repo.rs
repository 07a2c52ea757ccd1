use async_trait::async_trait;
use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::application::ports::repositories::*;

/// SQLite implementation of KvStore
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT value FROM kv_store WHERE key = ?"
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read key {}", key))?;

        Ok(result.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))"
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write key {}", key))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete key {}", key))?;
        Ok(())
    }

    async fn compare_and_set(&self, key: &str, expected: Option<&[u8]>, new: &[u8]) -> Result<bool> {
        // A single statement each way, so SQLite gives us the atomicity
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))
                     ON CONFLICT(key) DO NOTHING"
                )
                .bind(key)
                .bind(new)
                .execute(&self.pool)
                .await
            }
            Some(old) => {
                sqlx::query(
                    "UPDATE kv_store SET value = ?, updated_at = datetime('now') WHERE key = ? AND value = ?"
                )
                .bind(new)
                .bind(key)
                .bind(old)
                .execute(&self.pool)
                .await
            }
        }
        .with_context(|| format!("Failed to compare-and-set key {}", key))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteKvStore {
        // one connection, otherwise every connection gets its own in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteKvStore::new(pool)
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let store = store().await;
        assert!(store.get("subscriptions").await.unwrap().is_none());

        store.set("subscriptions", b"{}").await.unwrap();
        assert_eq!(store.get("subscriptions").await.unwrap(), Some(b"{}".to_vec()));

        store.set("subscriptions", b"{\"byKey\":{}}").await.unwrap();
        assert_eq!(store.get("subscriptions").await.unwrap(), Some(b"{\"byKey\":{}}".to_vec()));

        store.delete("subscriptions").await.unwrap();
        assert!(store.get("subscriptions").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare_and_set_insert_if_absent() {
        let store = store().await;
        assert!(store.compare_and_set("vcs_ghe", None, b"a").await.unwrap());
        assert!(!store.compare_and_set("vcs_ghe", None, b"b").await.unwrap());
        assert_eq!(store.get("vcs_ghe").await.unwrap(), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_set_swaps_only_on_match() {
        let store = store().await;
        store.set("vcs_list", b"[]").await.unwrap();

        assert!(!store.compare_and_set("vcs_list", Some(b"[1]"), b"[2]").await.unwrap());
        assert!(store.compare_and_set("vcs_list", Some(b"[]"), b"[2]").await.unwrap());
        assert!(!store.compare_and_set("vcs_list", Some(b"[]"), b"[3]").await.unwrap());
        assert_eq!(store.get("vcs_list").await.unwrap(), Some(b"[2]".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_set_on_missing_key_with_expected_value() {
        let store = store().await;
        assert!(!store.compare_and_set("missing", Some(b"x"), b"y").await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
