//! Component registry.
//!
//! Maps case-sensitive type names to component implementations plus their
//! static [`ComponentSpec`]. Built once at startup, then shared by `Arc` across
//! every mounted page; nothing here is global.
//!
//! Lazily registered components are constructed on the first
//! [`resolve`](ComponentRegistry::resolve) and the outcome (success or failure)
//! is cached. The slot lock is not held while a loader runs, so a loader may
//! itself resolve other components. Two threads racing on a cold slot can both
//! run the loader; the first stored outcome wins and later lookups see only it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::Component;
use crate::spec::ComponentSpec;

/// Deferred constructor for a lazily registered component.
pub type Loader = Box<dyn Fn() -> anyhow::Result<Arc<dyn Component>> + Send + Sync>;

/// Result of looking up a type name.
#[derive(Clone)]
pub enum Resolution {
    Found(Arc<dyn Component>),
    NotFound,
    /// A lazy loader failed; the message is cached.
    LoadFailed(String),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found(_) => f.write_str("Found(..)"),
            Self::NotFound => f.write_str("NotFound"),
            Self::LoadFailed(m) => f.debug_tuple("LoadFailed").field(m).finish(),
        }
    }
}

enum Slot {
    Ready(Arc<dyn Component>),
    Lazy {
        loader: Loader,
        cached: Mutex<Option<Result<Arc<dyn Component>, String>>>,
    },
}

struct Registered {
    spec: ComponentSpec,
    slot: Slot,
}

#[derive(Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<String, Registered>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in component set.
    #[cfg(feature = "builtin")]
    pub fn builtin() -> anyhow::Result<Self> {
        let mut reg = Self::new();
        crate::builtin::register_builtins(&mut reg)?;
        Ok(reg)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register an eagerly constructed component.
    pub fn register(&mut self, spec: ComponentSpec, component: Arc<dyn Component>) -> anyhow::Result<()> {
        self.insert(spec, Slot::Ready(component))
    }

    /// Register a component whose construction is deferred to first use.
    pub fn register_lazy<F>(&mut self, spec: ComponentSpec, loader: F) -> anyhow::Result<()>
    where
        F: Fn() -> anyhow::Result<Arc<dyn Component>> + Send + Sync + 'static,
    {
        self.insert(
            spec,
            Slot::Lazy {
                loader: Box::new(loader),
                cached: Mutex::new(None),
            },
        )
    }

    fn insert(&mut self, spec: ComponentSpec, slot: Slot) -> anyhow::Result<()> {
        spec.validate()?;
        let name = spec.type_name.clone();
        if self.entries.contains_key(&name) {
            anyhow::bail!("component type already registered: {name}");
        }
        self.entries.insert(name, Registered { spec, slot });
        Ok(())
    }

    /// Look up a type name. Exact, case-sensitive match.
    pub fn resolve(&self, type_name: &str) -> Resolution {
        let Some(entry) = self.entries.get(type_name) else {
            return Resolution::NotFound;
        };
        match &entry.slot {
            Slot::Ready(c) => Resolution::Found(c.clone()),
            Slot::Lazy { loader, cached } => {
                if let Some(done) = cached.lock().as_ref() {
                    return Self::outcome(done);
                }
                tracing::debug!(component = type_name, "loading lazy component");
                let loaded = loader().map_err(|e| {
                    tracing::warn!(component = type_name, error = %e, "component failed to load");
                    format!("{e:#}")
                });
                let mut cached = cached.lock();
                Self::outcome(cached.get_or_insert(loaded))
            }
        }
    }

    fn outcome(done: &Result<Arc<dyn Component>, String>) -> Resolution {
        match done {
            Ok(c) => Resolution::Found(c.clone()),
            Err(m) => Resolution::LoadFailed(m.clone()),
        }
    }

    pub fn spec(&self, type_name: &str) -> Option<&ComponentSpec> {
        self.entries.get(type_name).map(|e| &e.spec)
    }

    /// Specs in type-name order.
    pub fn specs(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.entries.values().map(|e| &e.spec)
    }

    pub fn list_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Whether a lazy component has been constructed. Eager ones always are.
    pub fn is_loaded(&self, type_name: &str) -> bool {
        match self.entries.get(type_name).map(|e| &e.slot) {
            Some(Slot::Ready(_)) => true,
            Some(Slot::Lazy { cached, .. }) => matches!(&*cached.lock(), Some(Ok(_))),
            None => false,
        }
    }
}
