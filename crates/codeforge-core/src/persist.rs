//! Background persistence queue for `kv` sources.
//!
//! `DataSourceRegistry::set` never awaits storage. It pushes a write onto an
//! unbounded channel drained by a single tokio task, so writes reach the backend
//! in the order they were made. A failed write leaves the in-memory value in
//! place; the failure is logged once per key until a later write to that key
//! succeeds.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::storage::KvStorage;

enum Command {
    Write { key: String, value: Value },
    Delete { key: String },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct Counters {
    written: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time persistence counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PersistStats {
    pub written: u64,
    pub failed: u64,
}

/// Spawns the persistence worker.
pub struct Persister;

impl Persister {
    /// Start a worker on the current tokio runtime.
    pub fn spawn(storage: Arc<dyn KvStorage>) -> PersistHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        tokio::spawn(run(storage, rx, counters.clone()));
        PersistHandle { tx, counters }
    }
}

/// Cheap, cloneable sender side of the persistence queue.
#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for PersistHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistHandle")
            .field("stats", &self.stats())
            .finish()
    }
}

impl PersistHandle {
    /// Queue a write. Returns immediately.
    pub fn write(&self, key: impl Into<String>, value: Value) {
        self.send(Command::Write {
            key: key.into(),
            value,
        });
    }

    pub fn delete(&self, key: impl Into<String>) {
        self.send(Command::Delete { key: key.into() });
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack));
        // A closed worker has nothing left to flush.
        let _ = done.await;
    }

    pub fn stats(&self) -> PersistStats {
        PersistStats {
            written: self.counters.written.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            tracing::warn!("persistence worker has stopped; write kept in memory only");
        }
    }
}

async fn run(
    storage: Arc<dyn KvStorage>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    counters: Arc<Counters>,
) {
    let mut failing: HashSet<String> = HashSet::new();
    let backend = storage.backend_name();

    while let Some(cmd) = rx.recv().await {
        let (key, result) = match cmd {
            Command::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
            Command::Write { key, value } => {
                let r = storage.set(&key, value).await;
                (key, r)
            }
            Command::Delete { key } => {
                let r = storage.delete(&key).await;
                (key, r)
            }
        };

        match result {
            Ok(()) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
                if failing.remove(&key) {
                    tracing::info!(%key, backend, "persistence recovered");
                }
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                if failing.insert(key.clone()) {
                    tracing::warn!(%key, backend, error = %err, "persistence failed; value kept in memory only");
                } else {
                    tracing::debug!(%key, backend, error = %err, "persistence still failing");
                }
            }
        }
    }
    tracing::debug!(backend, "persistence worker stopped");
}
