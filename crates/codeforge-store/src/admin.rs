//! Whole-store operations shared by every backend: clear, export, import and
//! usage stats. These back the HTTP service and the `codeforge storage`
//! commands; pages only ever use the [`KvStorage`] half.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use codeforge_core::storage::{KvStorage, MemoryStorage};
use codeforge_core::ForgeResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_keys: u64,
    /// Sum of the serialized JSON value lengths.
    pub total_size_bytes: u64,
    /// Database file, directory or base URL.
    pub location: String,
}

#[async_trait]
pub trait StoreAdmin: KvStorage {
    async fn clear(&self) -> ForgeResult<()>;
    async fn export(&self) -> ForgeResult<BTreeMap<String, Value>>;
    /// Upsert every entry; returns how many were written.
    async fn import(&self, entries: BTreeMap<String, Value>) -> ForgeResult<usize>;
    async fn stats(&self) -> ForgeResult<StoreStats>;

    fn into_kv(self: Arc<Self>) -> Arc<dyn KvStorage>;
}

#[async_trait]
impl StoreAdmin for MemoryStorage {
    async fn clear(&self) -> ForgeResult<()> {
        for key in self.keys().await? {
            self.delete(&key).await?;
        }
        Ok(())
    }

    async fn export(&self) -> ForgeResult<BTreeMap<String, Value>> {
        Ok(self.snapshot().await)
    }

    async fn import(&self, entries: BTreeMap<String, Value>) -> ForgeResult<usize> {
        let n = entries.len();
        for (k, v) in entries {
            self.set(&k, v).await?;
        }
        Ok(n)
    }

    async fn stats(&self) -> ForgeResult<StoreStats> {
        let snapshot = self.snapshot().await;
        Ok(StoreStats {
            total_keys: snapshot.len() as u64,
            total_size_bytes: snapshot.values().map(|v| v.to_string().len() as u64).sum(),
            location: "memory".to_string(),
        })
    }

    fn into_kv(self: Arc<Self>) -> Arc<dyn KvStorage> {
        self
    }
}

/// Current UTC time as RFC 3339.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
