//! Persistent key-value storage contract.
//!
//! `kv` data sources hydrate from and persist to a [`KvStorage`]. The registry
//! treats every error from this boundary as recoverable: hydration falls back to
//! the declared default and writes degrade to memory-only.
//!
//! Durable backends (SQLite, filesystem, remote HTTP) live in `codeforge-store`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::{ForgeError, ForgeResult};

#[async_trait]
pub trait KvStorage: Send + Sync + 'static {
    /// Short backend name for logs and CLI output.
    fn backend_name(&self) -> &'static str {
        "unknown"
    }

    async fn get(&self, key: &str) -> ForgeResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> ForgeResult<()>;
    async fn delete(&self, key: &str) -> ForgeResult<()>;
    async fn keys(&self) -> ForgeResult<Vec<String>>;
}

/// In-process storage. Values are lost when the process exits.
///
/// Writes can be switched to fail, which is how tests exercise the
/// memory-only degradation path.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Value>>,
    reject_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            entries: RwLock::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent `set`/`delete` calls fail until switched back.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.read().await.clone()
    }

    fn check_writable(&self) -> ForgeResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(ForgeError::storage("memory storage is rejecting writes"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStorage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> ForgeResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> ForgeResult<()> {
        self.check_writable()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ForgeResult<()> {
        self.check_writable()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> ForgeResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
