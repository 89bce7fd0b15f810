//! Filesystem backend: one JSON file per key under a root directory.
//!
//! File names are the hex-encoded key plus `.json`, so any key maps to a safe
//! name and `keys()` can decode them back. Writes go to a temp file first and
//! are renamed into place.

#![cfg(feature = "fs")]

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use codeforge_core::storage::KvStorage;
use codeforge_core::ForgeResult;

use crate::admin::{StoreAdmin, StoreStats};
use crate::error::{StoreError, StoreResult};

const EXT: &str = "json";

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.{EXT}", hex::encode(key.as_bytes()))))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != EXT {
            return None;
        }
        let bytes = hex::decode(path.file_stem()?.to_str()?).ok()?;
        String::from_utf8(bytes).ok()
    }

    async fn read(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &Value) -> StoreResult<()> {
        let path = self.file_for(key)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(value)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn entries(&self) -> StoreResult<Vec<(String, PathBuf)>> {
        let mut out = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if let Some(key) = Self::key_for(&path) {
                out.push((key, path));
            }
        }
        out.sort();
        Ok(out)
    }
}

#[async_trait]
impl KvStorage for FsStore {
    fn backend_name(&self) -> &'static str {
        "fs"
    }

    async fn get(&self, key: &str) -> ForgeResult<Option<Value>> {
        let path = self.file_for(key)?;
        match self.read(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> ForgeResult<()> {
        Ok(self.write(key, &value).await?)
    }

    async fn delete(&self, key: &str) -> ForgeResult<()> {
        let path = self.file_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::from(e).into()),
        }
    }

    async fn keys(&self) -> ForgeResult<Vec<String>> {
        Ok(self.entries().await?.into_iter().map(|(k, _)| k).collect())
    }
}

#[async_trait]
impl StoreAdmin for FsStore {
    async fn clear(&self) -> ForgeResult<()> {
        for (_, path) in self.entries().await? {
            fs::remove_file(&path).await.map_err(StoreError::from)?;
        }
        Ok(())
    }

    async fn export(&self) -> ForgeResult<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for (key, path) in self.entries().await? {
            if let Some(bytes) = self.read(&path).await? {
                out.insert(key, serde_json::from_slice(&bytes).map_err(StoreError::from)?);
            }
        }
        Ok(out)
    }

    async fn import(&self, entries: BTreeMap<String, Value>) -> ForgeResult<usize> {
        let n = entries.len();
        for (k, v) in &entries {
            self.write(k, v).await?;
        }
        Ok(n)
    }

    async fn stats(&self) -> ForgeResult<StoreStats> {
        let entries = self.entries().await?;
        let mut size = 0u64;
        for (_, path) in &entries {
            size += fs::metadata(path).await.map_err(StoreError::from)?.len();
        }
        Ok(StoreStats {
            total_keys: entries.len() as u64,
            total_size_bytes: size,
            location: self.root.display().to_string(),
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
    async fn keys_with_any_characters_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        for key in ["todos", "app:settings/theme", "../escape", "ключ"] {
            store.set(key, json!({"k": key})).await.unwrap();
        }
        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["../escape", "app:settings/theme", "todos", "ключ"]);
        assert_eq!(store.get("../escape").await.unwrap(), Some(json!({"k": "../escape"})));
        assert!(std::fs::read_dir(dir.path()).unwrap().count() == 4);
    }

    #[tokio::test]
    async fn delete_missing_is_ok_and_empty_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.delete("nothing").await.unwrap();
        assert!(store.set("", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn admin_operations() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path().join("kv")).unwrap();
        store
            .import(BTreeMap::from([("a".to_string(), json!(1)), ("b".to_string(), json!([1, 2]))]))
            .await
            .unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_keys, 2);
        assert_eq!(stats.total_size_bytes, ("1".len() + "[1,2]".len()) as u64);
        assert_eq!(store.export().await.unwrap()["b"], json!([1, 2]));
        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}
