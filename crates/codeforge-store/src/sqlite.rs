//! SQLite backend.
//!
//! One table, `storage(key, value, created_at, updated_at)`, values stored as
//! JSON text. The connection sits behind a mutex and every query runs on the
//! blocking pool.

#![cfg(feature = "sqlite")]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use codeforge_core::storage::KvStorage;
use codeforge_core::ForgeResult;

use crate::admin::{now_rfc3339, StoreAdmin, StoreStats};
use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS storage (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_updated_at ON storage(updated_at);
";

const UPSERT: &str = "
    INSERT INTO storage (key, value, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating parent directories and the table if needed).
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "sqlite store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&mut conn.lock())).await?
    }

    /// `created_at`/`updated_at` of a key.
    pub async fn timestamps(&self, key: &str) -> StoreResult<Option<(String, String)>> {
        let key = key.to_string();
        self.run(move |c| {
            Ok(c.query_row(
                "SELECT created_at, updated_at FROM storage WHERE key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?)
        })
        .await
    }
}

#[async_trait]
impl KvStorage for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> ForgeResult<Option<Value>> {
        let key = key.to_string();
        let raw: Option<String> = self
            .run(move |c| {
                Ok(c.query_row("SELECT value FROM storage WHERE key = ?1", params![key], |r| r.get(0))
                    .optional()?)
            })
            .await?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> ForgeResult<()> {
        let key = key.to_string();
        let text = serde_json::to_string(&value).map_err(StoreError::from)?;
        self.run(move |c| {
            c.execute(UPSERT, params![key, text, now_rfc3339()])?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> ForgeResult<()> {
        let key = key.to_string();
        self.run(move |c| {
            c.execute("DELETE FROM storage WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn keys(&self) -> ForgeResult<Vec<String>> {
        let keys = self
            .run(|c| {
                let mut stmt = c.prepare("SELECT key FROM storage ORDER BY key")?;
                let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(keys)
    }
}

#[async_trait]
impl StoreAdmin for SqliteStore {
    async fn clear(&self) -> ForgeResult<()> {
        self.run(|c| {
            c.execute("DELETE FROM storage", [])?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn export(&self) -> ForgeResult<BTreeMap<String, Value>> {
        let rows: Vec<(String, String)> = self
            .run(|c| {
                let mut stmt = c.prepare("SELECT key, value FROM storage")?;
                let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        let mut out = BTreeMap::new();
        for (k, text) in rows {
            out.insert(k, serde_json::from_str(&text).map_err(StoreError::from)?);
        }
        Ok(out)
    }

    async fn import(&self, entries: BTreeMap<String, Value>) -> ForgeResult<usize> {
        let mut encoded = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            encoded.push((k, serde_json::to_string(&v).map_err(StoreError::from)?));
        }
        let n = self
            .run(move |c| {
                let now = now_rfc3339();
                let tx = c.transaction()?;
                {
                    let mut stmt = tx.prepare(UPSERT)?;
                    for (k, text) in &encoded {
                        stmt.execute(params![k, text, now])?;
                    }
                }
                tx.commit()?;
                Ok(encoded.len())
            })
            .await?;
        Ok(n)
    }

    async fn stats(&self) -> ForgeResult<StoreStats> {
        let (count, size): (i64, i64) = self
            .run(|c| {
                Ok(c.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0) FROM storage",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?)
            })
            .await?;
        Ok(StoreStats {
            total_keys: count.max(0) as u64,
            total_size_bytes: size.max(0) as u64,
            location: self.path.display().to_string(),
        })
    }

    fn into_kv(self: Arc<Self>) -> Arc<dyn KvStorage> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn crud_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("todos", json!([{"id": 1}])).await.unwrap();
        store.set("todos", json!([{"id": 1}, {"id": 2}])).await.unwrap();
        assert_eq!(store.get("todos").await.unwrap(), Some(json!([{"id": 1}, {"id": 2}])));
        assert_eq!(store.keys().await.unwrap(), vec!["todos".to_string()]);

        store.delete("todos").await.unwrap();
        assert_eq!(store.get("todos").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_keeps_created_at() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("k", json!(1)).await.unwrap();
        let (created, _) = store.timestamps("k").await.unwrap().unwrap();
        store.set("k", json!(2)).await.unwrap();
        let (created_again, updated) = store.timestamps("k").await.unwrap().unwrap();
        assert_eq!(created, created_again);
        assert!(updated >= created);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("codeforge.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("count", json!(3)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("count").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn admin_operations() {
        let store = SqliteStore::in_memory().unwrap();
        let n = store
            .import(BTreeMap::from([
                ("a".to_string(), json!({"x": 1})),
                ("b".to_string(), json!("hi")),
            ]))
            .await
            .unwrap();
        assert_eq!(n, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.total_size_bytes, (r#"{"x":1}"#.len() + r#""hi""#.len()) as u64);

        let exported = store.export().await.unwrap();
        assert_eq!(exported["a"], json!({"x": 1}));

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}
