//! codeforge-store
//!
//! Durable backends for `kv` data sources. Every backend implements the core
//! [`KvStorage`](codeforge_core::storage::KvStorage) contract plus
//! [`StoreAdmin`] for whole-store operations.
//!
//! Features:
//! - `sqlite` (default): [`SqliteStore`](sqlite::SqliteStore), the layout the storage service uses
//! - `fs` (default): [`FsStore`](fs::FsStore), one JSON file per key
//! - `http`: [`RemoteStore`](remote::RemoteStore), a client for the storage service

use std::path::PathBuf;
use std::sync::Arc;

use codeforge_core::storage::MemoryStorage;

pub mod admin;
pub mod error;

#[cfg(feature = "fs")]
pub mod fs;
#[cfg(feature = "http")]
pub mod remote;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use crate::admin::{StoreAdmin, StoreStats};
pub use crate::error::{StoreError, StoreResult};

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Sqlite(PathBuf),
    Fs(PathBuf),
    Remote(String),
}

impl StoreLocation {
    /// Open the backend. Fails when its cargo feature is disabled.
    pub fn open(&self) -> StoreResult<Arc<dyn StoreAdmin>> {
        tracing::debug!(location = ?self, "opening store");
        match self {
            Self::Memory => Ok(Arc::new(MemoryStorage::new())),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(path) => Ok(Arc::new(sqlite::SqliteStore::open(path)?)),
            #[cfg(feature = "fs")]
            Self::Fs(root) => Ok(Arc::new(fs::FsStore::open(root)?)),
            #[cfg(feature = "http")]
            Self::Remote(url) => Ok(Arc::new(remote::RemoteStore::new(url)?)),
            #[allow(unreachable_patterns)]
            other => Err(StoreError::Unsupported(format!("{other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeforge_core::storage::KvStorage;
    use serde_json::json;

    #[tokio::test]
    async fn opened_store_serves_pages_and_admin() {
        let dir = tempfile::tempdir().unwrap();
        for loc in [
            StoreLocation::Memory,
            StoreLocation::Sqlite(dir.path().join("kv.db")),
            StoreLocation::Fs(dir.path().join("kv")),
        ] {
            let store = loc.open().unwrap();
            store.set("k", json!({"v": 1})).await.unwrap();
            assert_eq!(store.stats().await.unwrap().total_keys, 1);
            let kv = store.clone().into_kv();
            assert_eq!(kv.get("k").await.unwrap(), Some(json!({"v": 1})));
        }
    }
}
