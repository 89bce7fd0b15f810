//! Data-source registry.
//!
//! One registry per mounted page. It keeps the latest value of every declared
//! source in memory (reads never touch storage), persists `kv` writes through
//! the background [`Persister`](crate::persist::Persister), and re-derives
//! computed sources in dependency order after every write.
//!
//! Hydration of `kv` sources can run in one step ([`DataSourceRegistry::initialize`])
//! or be split so a host can paint defaults first:
//!
//! ```text
//! let mut reg = DataSourceRegistry::new(defs)?;      // defaults, computed evaluated
//! let req = reg.begin_hydration();                  // no borrow of `reg` kept
//! let loaded = req.load(storage.as_ref()).await;    // async, storage only
//! let changed = reg.apply_hydration(loaded);        // discarded if unmounted
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::DataContext;
use crate::errors::{ForgeError, ForgeResult};
use crate::expr::{Evaluator, Expr, Scope};
use crate::model::SourceKind;
use crate::persist::{PersistHandle, Persister};
use crate::storage::KvStorage;

pub mod graph;

pub use graph::{DependencyGraph, GraphError};

/// A compute function supplied from Rust instead of an expression.
pub type NativeCompute = Arc<dyn Fn(&DataContext) -> ForgeResult<Value> + Send + Sync>;

/// How a computed source derives its value.
#[derive(Clone)]
pub enum Compute {
    Expr(Expr),
    Native(NativeCompute),
}

impl fmt::Debug for Compute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expr(e) => f.debug_tuple("Expr").field(&e.source()).finish(),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl Compute {
    fn run(&self, ev: &Evaluator, ctx: &DataContext) -> ForgeResult<Value> {
        match self {
            Self::Expr(e) => Ok(e.eval(ev, &Scope::new(ctx))?.unwrap_or(Value::Null)),
            Self::Native(f) => f(ctx),
        }
    }
}

/// A compiled data-source declaration.
#[derive(Debug, Clone)]
pub enum SourceDef {
    Kv {
        id: String,
        key: String,
        default: Value,
    },
    Static {
        id: String,
        default: Value,
    },
    Computed {
        id: String,
        compute: Compute,
        dependencies: Vec<String>,
    },
}

impl SourceDef {
    pub fn kv(id: impl Into<String>, key: impl Into<String>, default: Value) -> Self {
        Self::Kv {
            id: id.into(),
            key: key.into(),
            default,
        }
    }

    pub fn static_value(id: impl Into<String>, default: Value) -> Self {
        Self::Static {
            id: id.into(),
            default,
        }
    }

    pub fn computed(id: impl Into<String>, expr: Expr, dependencies: Vec<String>) -> Self {
        Self::Computed {
            id: id.into(),
            compute: Compute::Expr(expr),
            dependencies,
        }
    }

    pub fn computed_fn<F>(id: impl Into<String>, dependencies: Vec<String>, f: F) -> Self
    where
        F: Fn(&DataContext) -> ForgeResult<Value> + Send + Sync + 'static,
    {
        Self::Computed {
            id: id.into(),
            compute: Compute::Native(Arc::new(f)),
            dependencies,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Kv { id, .. } | Self::Static { id, .. } | Self::Computed { id, .. } => id,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Kv { .. } => SourceKind::Kv,
            Self::Static { .. } => SourceKind::Static,
            Self::Computed { .. } => SourceKind::Computed,
        }
    }

    pub fn dependencies(&self) -> &[String] {
        match self {
            Self::Computed { dependencies, .. } => dependencies,
            _ => &[],
        }
    }
}

/// Ids whose value changed as the result of one write (the written id plus
/// every computed source that re-derived to a different value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOutcome {
    pub changed: BTreeSet<String>,
}

impl SetOutcome {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.changed.contains(id)
    }

    pub fn merge(&mut self, other: SetOutcome) {
        self.changed.extend(other.changed);
    }
}

/// Keys to load for one hydration pass. Holds no reference to the registry.
#[derive(Debug, Clone)]
pub struct HydrationRequest {
    generation: u64,
    keys: Vec<(String, String)>,
}

impl HydrationRequest {
    /// Read every `kv` key. Misses and storage failures yield `None`, which
    /// leaves the source at its current value.
    pub async fn load(self, storage: &dyn KvStorage) -> HydrationResult {
        let mut loaded = Vec::with_capacity(self.keys.len());
        for (id, key) in self.keys {
            let value = match storage.get(&key).await {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(source = %id, %key, error = %err, "hydration failed; using default");
                    None
                }
            };
            loaded.push((id, value));
        }
        HydrationResult {
            generation: self.generation,
            loaded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HydrationResult {
    generation: u64,
    loaded: Vec<(String, Option<Value>)>,
}

pub struct DataSourceRegistry {
    defs: BTreeMap<String, SourceDef>,
    ctx: DataContext,
    graph: DependencyGraph,
    evaluator: Evaluator,
    persist: Option<PersistHandle>,
    generation: u64,
    mounted: bool,
    /// Ids written while a hydration pass is in flight; local writes win.
    written_since_hydration: HashSet<String>,
}

impl fmt::Debug for DataSourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceRegistry")
            .field("sources", &self.graph.order())
            .field("mounted", &self.mounted)
            .field("generation", &self.generation)
            .finish()
    }
}

impl DataSourceRegistry {
    /// Build a registry from defaults and evaluate computed sources once.
    /// `kv` sources hold their defaults until hydrated.
    pub fn new(defs: Vec<SourceDef>) -> ForgeResult<Self> {
        Self::new_with(defs, Evaluator::default())
    }

    pub fn new_with(defs: Vec<SourceDef>, evaluator: Evaluator) -> ForgeResult<Self> {
        let mut reg = Self::build(defs, evaluator)?;
        reg.compute_all();
        Ok(reg)
    }

    /// Build, hydrate every `kv` source from `storage`, then evaluate computed
    /// sources once. Writes are persisted to the same storage in the background.
    pub async fn initialize(defs: Vec<SourceDef>, storage: Arc<dyn KvStorage>) -> ForgeResult<Self> {
        Self::initialize_with(defs, storage, Evaluator::default()).await
    }

    pub async fn initialize_with(
        defs: Vec<SourceDef>,
        storage: Arc<dyn KvStorage>,
        evaluator: Evaluator,
    ) -> ForgeResult<Self> {
        let mut reg = Self::build(defs, evaluator)?;
        let req = reg.begin_hydration();
        let loaded = req.load(storage.as_ref()).await;
        reg.apply_loaded(loaded);
        reg.compute_all();
        reg.persist = Some(Persister::spawn(storage));
        tracing::debug!(sources = reg.defs.len(), "data sources initialized");
        Ok(reg)
    }

    fn build(defs: Vec<SourceDef>, evaluator: Evaluator) -> ForgeResult<Self> {
        let mut seen = HashSet::with_capacity(defs.len());
        if let Some(dup) = defs.iter().find(|d| !seen.insert(d.id())) {
            return Err(ForgeError::invalid_argument(format!(
                "duplicate data source id: {}",
                dup.id()
            )));
        }
        let graph = DependencyGraph::build(defs.iter().map(|d| (d.id(), d.dependencies())))
            .map_err(|e| ForgeError::InvalidSchema(vec![e.to_diagnostic()]))?;

        let mut ctx = DataContext::new();
        let mut by_id = BTreeMap::new();
        for def in defs {
            let initial = match &def {
                SourceDef::Kv { default, .. } | SourceDef::Static { default, .. } => default.clone(),
                SourceDef::Computed { .. } => Value::Null,
            };
            ctx.insert(def.id(), initial);
            by_id.insert(def.id().to_string(), def);
        }

        Ok(Self {
            defs: by_id,
            ctx,
            graph,
            evaluator,
            persist: None,
            generation: 0,
            mounted: true,
            written_since_hydration: HashSet::new(),
        })
    }

    /// Route `kv` writes through an existing persistence queue.
    pub fn attach_persistence(&mut self, handle: PersistHandle) {
        self.persist = Some(handle);
    }

    pub fn persistence(&self) -> Option<&PersistHandle> {
        self.persist.as_ref()
    }

    /// Wait for queued `kv` writes to reach storage.
    pub async fn flush(&self) {
        if let Some(p) = &self.persist {
            p.flush().await;
        }
    }

    pub fn begin_hydration(&mut self) -> HydrationRequest {
        self.written_since_hydration.clear();
        let keys = self
            .defs
            .values()
            .filter_map(|d| match d {
                SourceDef::Kv { id, key, .. } => Some((id.clone(), key.clone())),
                _ => None,
            })
            .collect();
        HydrationRequest {
            generation: self.generation,
            keys,
        }
    }

    /// Apply loaded `kv` values and re-derive what depends on them.
    ///
    /// Results from a previous mount generation, or arriving after
    /// [`unmount`](Self::unmount), are discarded.
    pub fn apply_hydration(&mut self, result: HydrationResult) -> SetOutcome {
        let changed = self.apply_loaded(result);
        if changed.is_empty() {
            return SetOutcome::default();
        }
        let downstream = self.graph.downstream(changed.iter().map(String::as_str));
        let mut out = SetOutcome { changed };
        out.changed.extend(self.recompute(&downstream));
        out
    }

    fn apply_loaded(&mut self, result: HydrationResult) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        if !self.mounted || result.generation != self.generation {
            tracing::debug!(
                generation = result.generation,
                current = self.generation,
                "discarding stale hydration result"
            );
            return changed;
        }
        for (id, value) in result.loaded {
            let Some(value) = value else { continue };
            if self.written_since_hydration.contains(&id) || !self.defs.contains_key(&id) {
                continue;
            }
            if self.ctx.get(&id) != Some(&value) {
                self.ctx.insert(id.clone(), value);
                changed.insert(id);
            }
        }
        changed
    }

    pub fn get(&self, id: &str) -> ForgeResult<&Value> {
        self.ctx.get(id).ok_or_else(|| ForgeError::unknown_source(id))
    }

    pub fn kind(&self, id: &str) -> Option<SourceKind> {
        self.defs.get(id).map(SourceDef::kind)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.defs.contains_key(id)
    }

    /// Live view of every source value.
    pub fn context(&self) -> &DataContext {
        &self.ctx
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Write a source, persist it if `kv`, and re-derive its dependents.
    pub fn set(&mut self, id: &str, value: Value) -> ForgeResult<SetOutcome> {
        let def = self.defs.get(id).ok_or_else(|| ForgeError::unknown_source(id))?;
        if !self.mounted {
            return Err(ForgeError::invariant(format!(
                "write to {id} after the page was unmounted"
            )));
        }
        let persist_key = match def {
            SourceDef::Computed { .. } => {
                return Err(ForgeError::invalid_argument(format!(
                    "computed source {id} is read-only"
                )));
            }
            SourceDef::Kv { key, .. } => Some(key.clone()),
            SourceDef::Static { .. } => None,
        };

        self.written_since_hydration.insert(id.to_string());
        if self.ctx.get(id) == Some(&value) {
            return Ok(SetOutcome::default());
        }

        if let (Some(key), Some(p)) = (persist_key, &self.persist) {
            p.write(key, value.clone());
        }
        self.ctx.insert(id, value);

        let downstream = self.graph.downstream([id]);
        let mut out = SetOutcome::default();
        out.changed.insert(id.to_string());
        out.changed.extend(self.recompute(&downstream));
        Ok(out)
    }

    fn compute_all(&mut self) {
        let order = self.graph.order().to_vec();
        self.recompute(&order);
    }

    /// Re-derive the given ids in the order given (callers pass topological
    /// order). Returns the ids whose value changed.
    fn recompute(&mut self, ids: &[String]) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for id in ids {
            let Some(SourceDef::Computed { compute, .. }) = self.defs.get(id) else {
                continue;
            };
            match compute.run(&self.evaluator, &self.ctx) {
                Ok(value) => {
                    if self.ctx.get(id) != Some(&value) {
                        self.ctx.insert(id.clone(), value);
                        changed.insert(id.clone());
                    }
                }
                Err(err) => {
                    tracing::warn!(source = %id, error = %err, "compute failed; keeping previous value");
                }
            }
        }
        changed
    }

    /// Tear down: pending hydration results are discarded from now on.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.generation += 1;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn expr(src: &str) -> Expr {
        Expr::parse(src).unwrap()
    }

    fn todo_defs() -> Vec<SourceDef> {
        vec![
            SourceDef::kv("todos", "app-todos", json!([])),
            SourceDef::computed("stats", expr("({total: todos.length})"), vec!["todos".into()]),
            SourceDef::static_value("filter", json!("all")),
        ]
    }

    #[test]
    fn computed_sees_defaults() {
        let reg = DataSourceRegistry::new(todo_defs()).unwrap();
        assert_eq!(reg.get("stats").unwrap(), &json!({"total": 0}));
        assert_eq!(reg.get("filter").unwrap(), &json!("all"));
    }

    #[test]
    fn set_recomputes_dependents() {
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        let out = reg.set("todos", json!([{"id": 1}])).unwrap();
        assert_eq!(reg.get("stats").unwrap()["total"], 1);
        assert!(out.contains("todos") && out.contains("stats"));
        assert!(!out.contains("filter"));
    }

    #[test]
    fn unchanged_write_reports_nothing() {
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        assert!(reg.set("filter", json!("all")).unwrap().is_empty());
    }

    #[test]
    fn undeclared_ids_are_errors() {
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        assert_matches!(reg.get("ghost"), Err(ForgeError::UnknownSource(id)) if id == "ghost");
        assert_matches!(reg.set("ghost", json!(1)), Err(ForgeError::UnknownSource(_)));
    }

    #[test]
    fn computed_sources_are_read_only() {
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        assert_matches!(reg.set("stats", json!(1)), Err(ForgeError::InvalidArgument(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected_before_graph_build() {
        let defs = vec![
            SourceDef::computed("x", expr("a + 1"), vec!["a".into()]),
            SourceDef::static_value("a", json!(1)),
            SourceDef::static_value("a", json!(2)),
        ];
        assert_matches!(
            DataSourceRegistry::new(defs),
            Err(ForgeError::InvalidArgument(msg)) if msg == "duplicate data source id: a"
        );
    }

    #[test]
    fn failing_compute_keeps_previous_value() {
        let defs = vec![
            SourceDef::static_value("user", json!({"name": "ada"})),
            SourceDef::computed("upper", expr("user.name.toUpperCase()"), vec!["user".into()]),
        ];
        let mut reg = DataSourceRegistry::new(defs).unwrap();
        assert_eq!(reg.get("upper").unwrap(), &json!("ADA"));
        let out = reg.set("user", json!(null)).unwrap();
        assert_eq!(reg.get("upper").unwrap(), &json!("ADA"));
        assert!(!out.contains("upper"));
    }

    #[test]
    fn diamond_computes_each_source_once_per_write() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let defs = vec![
            SourceDef::static_value("n", json!(1)),
            SourceDef::computed("double", expr("n * 2"), vec!["n".into()]),
            SourceDef::computed("square", expr("n * n"), vec!["n".into()]),
            SourceDef::computed_fn("sum", vec!["double".into(), "square".into()], move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                let d = ctx.get("double").and_then(Value::as_i64).unwrap_or(0);
                let s = ctx.get("square").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(d + s))
            }),
        ];
        let mut reg = DataSourceRegistry::new(defs).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        reg.set("n", json!(3)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(reg.get("sum").unwrap(), &json!(15));
    }

    #[test]
    fn cycles_are_rejected() {
        let defs = vec![
            SourceDef::computed("a", expr("b"), vec!["b".into()]),
            SourceDef::computed("b", expr("a"), vec!["a".into()]),
        ];
        assert_matches!(DataSourceRegistry::new(defs), Err(ForgeError::InvalidSchema(d)) if d[0].code == "schema.cycle");
    }

    #[tokio::test]
    async fn kv_round_trips_across_instances() {
        let storage: Arc<dyn KvStorage> = Arc::new(MemoryStorage::new());
        let mut first = DataSourceRegistry::initialize(todo_defs(), storage.clone()).await.unwrap();
        first.set("todos", json!([{"id": "a"}, {"id": "b"}])).unwrap();
        first.flush().await;
        first.unmount();

        let second = DataSourceRegistry::initialize(todo_defs(), storage).await.unwrap();
        assert_eq!(second.get("todos").unwrap(), &json!([{"id": "a"}, {"id": "b"}]));
        assert_eq!(second.get("stats").unwrap()["total"], 2);
    }

    #[tokio::test]
    async fn storage_failure_keeps_memory_value() {
        let storage = Arc::new(MemoryStorage::new());
        storage.reject_writes(true);
        let mut reg = DataSourceRegistry::initialize(todo_defs(), storage.clone()).await.unwrap();
        reg.set("todos", json!([{"id": 1}])).unwrap();
        assert_eq!(reg.get("todos").unwrap(), &json!([{"id": 1}]));
        reg.flush().await;
        assert_eq!(reg.persistence().unwrap().stats().failed, 1);
        assert_eq!(reg.get("stats").unwrap()["total"], 1);
    }

    #[tokio::test]
    async fn hydration_after_unmount_is_discarded() {
        let storage = MemoryStorage::with_entries([("app-todos", json!([1, 2, 3]))]);
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        let req = reg.begin_hydration();
        reg.unmount();
        let loaded = req.load(&storage).await;
        assert!(reg.apply_hydration(loaded).is_empty());
        assert_eq!(reg.get("todos").unwrap(), &json!([]));
    }

    #[tokio::test]
    async fn split_hydration_updates_dependents() {
        let storage = MemoryStorage::with_entries([("app-todos", json!([1, 2, 3]))]);
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        let req = reg.begin_hydration();
        let out = reg.apply_hydration(req.load(&storage).await);
        assert!(out.contains("todos") && out.contains("stats"));
        assert_eq!(reg.get("stats").unwrap()["total"], 3);
    }

    #[tokio::test]
    async fn local_write_during_hydration_wins() {
        let storage = MemoryStorage::with_entries([("app-todos", json!([1, 2, 3]))]);
        let mut reg = DataSourceRegistry::new(todo_defs()).unwrap();
        let req = reg.begin_hydration();
        reg.set("todos", json!(["local"])).unwrap();
        reg.apply_hydration(req.load(&storage).await);
        assert_eq!(reg.get("todos").unwrap(), &json!(["local"]));
    }
}
