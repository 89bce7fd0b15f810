//! Page renderer.
//!
//! A [`Page`] is one mounted page schema: compiled schema, live data-source
//! registry, action dispatcher and the current rendered tree. It is the single
//! owner of its state; hosts drive it through [`Page::fire`] and read the
//! result through [`Page::tree`] or [`Page::to_html`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use codeforge_core::action::{ActionDispatcher, EffectLog, Effects};
use codeforge_core::config::{validate_config, EngineConfig};
use codeforge_core::context::DataContext;
use codeforge_core::datasource::DataSourceRegistry;
use codeforge_core::diagnostics::Diagnostic;
use codeforge_core::expr::{Evaluator, Val};
use codeforge_core::model::{compile_page, CompiledPage, PageSchema};
use codeforge_core::persist::PersistStats;
use codeforge_core::storage::KvStorage;
use codeforge_core::ForgeError;

use crate::html::{escape, to_html};
use crate::registry::ComponentRegistry;
use crate::render::{RenderStats, RenderedElement, Renderer};

/// Host collaborators and settings for a mounted page.
#[derive(Clone)]
pub struct PageEnv {
    pub config: EngineConfig,
    pub effects: Effects,
}

impl PageEnv {
    pub fn new(config: EngineConfig, effects: Effects) -> Self {
        Self { config, effects }
    }

    /// Default limits; every effect goes to `log`.
    pub fn logged(log: Arc<EffectLog>) -> Self {
        Self::new(EngineConfig::default(), Effects::logged(log))
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    /// The schema failed validation; the page shows an error state instead of
    /// a partial tree.
    #[error("page schema is invalid: {} error(s)", .0.iter().filter(|d| d.is_error()).count())]
    Invalid(Vec<Diagnostic>),

    #[error(transparent)]
    Engine(ForgeError),

    #[error("no component with id {0}")]
    UnknownNode(String),

    #[error("component {node} has no {event} handler")]
    UnknownEvent { node: String, event: String },

    #[error("page is unmounted")]
    Unmounted,
}

impl From<ForgeError> for PageError {
    fn from(e: ForgeError) -> Self {
        match e {
            ForgeError::InvalidSchema(diags) => Self::Invalid(diags),
            other => Self::Engine(other),
        }
    }
}

impl PageError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Invalid(d) => d,
            _ => &[],
        }
    }

    /// Page-level error state listing every error.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<div class=\"cf-page-error\" role=\"alert\"><h2>Page failed to load</h2>");
        match self {
            Self::Invalid(diags) => {
                out.push_str("<ul>");
                for d in diags.iter().filter(|d| d.is_error()) {
                    out.push_str("<li><code>");
                    out.push_str(&escape(&d.code));
                    out.push_str("</code> ");
                    out.push_str(&escape(&d.message));
                    if let Some(p) = &d.path {
                        out.push_str(" <small>");
                        out.push_str(&escape(p));
                        out.push_str("</small>");
                    }
                    out.push_str("</li>");
                }
                out.push_str("</ul>");
            }
            other => {
                out.push_str("<p>");
                out.push_str(&escape(&other.to_string()));
                out.push_str("</p>");
            }
        }
        out.push_str("</div>");
        out
    }
}

/// What one fired event did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FireOutcome {
    pub changed: BTreeSet<String>,
    pub applied: usize,
    pub skipped: usize,
    pub rendered: usize,
    pub reused: usize,
}

pub struct Page {
    compiled: CompiledPage,
    data: DataSourceRegistry,
    renderer: Renderer,
    dispatcher: ActionDispatcher,
    effects: Effects,
    config: EngineConfig,
    tree: Vec<RenderedElement>,
    last_render: RenderStats,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.compiled.id)
            .field("nodes", &self.compiled.node_count())
            .field("data", &self.data)
            .finish()
    }
}

impl Page {
    /// Compile and validate `schema`, initialize its data sources (hydrating
    /// `kv` sources from `storage`) and render the tree.
    pub async fn mount(
        schema: &PageSchema,
        components: Arc<ComponentRegistry>,
        storage: Arc<dyn KvStorage>,
        env: PageEnv,
    ) -> Result<Self, PageError> {
        validate_config(&env.config)?;
        let compiled = compile_page(schema, &env.config)?;
        let evaluator = Evaluator::new(env.config.limits.max_eval_depth);
        let data = DataSourceRegistry::initialize_with(compiled.sources.clone(), storage, evaluator).await?;

        let renderer = Renderer::new(components, &env.config);
        let (tree, last_render) = renderer.render_all(&compiled.nodes, data.context());
        tracing::info!(
            page = %compiled.id,
            nodes = compiled.node_count(),
            rendered = last_render.rendered,
            "page mounted"
        );

        Ok(Self {
            compiled,
            data,
            renderer,
            dispatcher: ActionDispatcher::new(evaluator),
            effects: env.effects,
            config: env.config,
            tree,
            last_render,
        })
    }

    pub fn id(&self) -> &str {
        &self.compiled.id
    }

    pub fn compiled(&self) -> &CompiledPage {
        &self.compiled
    }

    /// Warnings collected at load time.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.compiled.report.diagnostics
    }

    pub fn tree(&self) -> &[RenderedElement] {
        &self.tree
    }

    pub fn find(&self, key: &str) -> Option<&RenderedElement> {
        self.tree.iter().find_map(|e| e.find(key))
    }

    pub fn to_html(&self) -> String {
        to_html(&self.tree, &self.config.render)
    }

    pub fn get(&self, source: &str) -> Option<&Value> {
        self.data.get(source).ok()
    }

    pub fn data(&self) -> &DataContext {
        self.data.context()
    }

    pub fn last_render(&self) -> RenderStats {
        self.last_render
    }

    pub fn persist_stats(&self) -> Option<PersistStats> {
        self.data.persistence().map(|p| p.stats())
    }

    /// Run the actions wired to `event` on `node_id`, then re-render the nodes
    /// that read a changed source.
    pub fn fire(&mut self, node_id: &str, event: &str, payload: Val) -> Result<FireOutcome, PageError> {
        if !self.data.is_mounted() {
            return Err(PageError::Unmounted);
        }
        let node = self
            .compiled
            .find_node(node_id)
            .ok_or_else(|| PageError::UnknownNode(node_id.to_string()))?;
        let actions = node.events.get(event).ok_or_else(|| PageError::UnknownEvent {
            node: node_id.to_string(),
            event: event.to_string(),
        })?;

        let dispatched = self
            .dispatcher
            .dispatch(actions, &payload, &mut self.data, &self.effects);
        tracing::debug!(
            node = node_id,
            event,
            applied = dispatched.applied,
            skipped = dispatched.skipped,
            changed = ?dispatched.changed,
            "event fired"
        );

        let stats = self.refresh(&dispatched.changed);
        Ok(FireOutcome {
            changed: dispatched.changed,
            applied: dispatched.applied,
            skipped: dispatched.skipped,
            rendered: stats.rendered,
            reused: stats.reused,
        })
    }

    /// Write a source directly, as a host-side editor would.
    pub fn set(&mut self, source: &str, value: Value) -> Result<FireOutcome, PageError> {
        let outcome = self.data.set(source, value)?;
        let stats = self.refresh(&outcome.changed);
        Ok(FireOutcome {
            changed: outcome.changed,
            applied: 1,
            skipped: 0,
            rendered: stats.rendered,
            reused: stats.reused,
        })
    }

    fn refresh(&mut self, changed: &BTreeSet<String>) -> RenderStats {
        let prev = std::mem::take(&mut self.tree);
        let (tree, stats) = self
            .renderer
            .rerender(&self.compiled.nodes, prev, self.data.context(), changed);
        self.tree = tree;
        self.last_render = stats;
        stats
    }

    /// Wait until queued `kv` writes reached storage.
    pub async fn flush(&self) {
        self.data.flush().await;
    }

    /// Tear down. Later hydration results are discarded and events rejected;
    /// `kv` values already persisted stay in storage.
    pub fn unmount(&mut self) {
        self.data.unmount();
        tracing::debug!(page = %self.compiled.id, "page unmounted");
    }
}
