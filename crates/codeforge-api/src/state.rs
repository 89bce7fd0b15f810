use std::sync::Arc;

use codeforge_components::ComponentRegistry;
use codeforge_core::config::EngineConfig;
use codeforge_store::StoreAdmin;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreAdmin>,
    pub components: Arc<ComponentRegistry>,
    pub engine: EngineConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreAdmin>, components: Arc<ComponentRegistry>, engine: EngineConfig) -> Self {
        Self {
            store,
            components,
            engine,
        }
    }

    /// Built-in component set and default engine limits.
    pub fn with_store(store: Arc<dyn StoreAdmin>) -> anyhow::Result<Self> {
        Ok(Self::new(
            store,
            Arc::new(ComponentRegistry::builtin()?),
            EngineConfig::default(),
        ))
    }
}
