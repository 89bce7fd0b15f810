//! Component renderer.
//!
//! Turns a [`CompiledNode`] plus the current data context into a
//! [`RenderedElement`] tree:
//!
//! 1. a falsy `condition` drops the node and its subtree
//! 2. the type is resolved through the [`ComponentRegistry`]; an unknown type
//!    becomes a placeholder and siblings are unaffected
//! 3. props (bindings already merged over inline props) are resolved
//! 4. the component produces its [`View`]; a failing component becomes an
//!    error placeholder
//! 5. declared events are recorded by name so the page can fire them
//! 6. children are rendered in order; `key` is the node id
//!
//! [`Renderer::rerender`] reuses every subtree whose dependency set does not
//! intersect the changed sources.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use codeforge_core::config::{EngineConfig, RenderConfig};
use codeforge_core::context::DataContext;
use codeforge_core::expr::{truthy, Evaluator, Scope};
use codeforge_core::model::CompiledNode;

use crate::component::{Props, View, ViewContext};
use crate::registry::{ComponentRegistry, Resolution};

/// Why a node shows a placeholder instead of its component output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Placeholder {
    UnknownType,
    LoadFailed { message: String },
    RenderFailed { message: String },
}

impl Placeholder {
    pub fn describe(&self, type_name: &str) -> String {
        match self {
            Self::UnknownType => format!("Unknown component: {type_name}"),
            Self::LoadFailed { message } => format!("Component {type_name} failed to load: {message}"),
            Self::RenderFailed { message } => format!("Component {type_name} failed to render: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedElement {
    pub key: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub props: Props,
    /// Wired event names; the action lists stay on the compiled node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<View>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Placeholder>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedElement>,
}

impl RenderedElement {
    pub fn find(&self, key: &str) -> Option<&RenderedElement> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(key))
    }

    /// Elements in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(RenderedElement::size).sum::<usize>()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }
}

/// Work done by one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStats {
    /// Nodes whose component output was produced again.
    pub rendered: usize,
    /// Nodes carried over from the previous tree.
    pub reused: usize,
}

pub struct Renderer {
    registry: Arc<ComponentRegistry>,
    evaluator: Evaluator,
    config: RenderConfig,
}

impl Renderer {
    pub fn new(registry: Arc<ComponentRegistry>, cfg: &EngineConfig) -> Self {
        Self {
            registry,
            evaluator: Evaluator::new(cfg.limits.max_eval_depth),
            config: cfg.render.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Render one node. `None` when its condition is falsy, or when it is a
    /// placeholder and placeholders are disabled.
    pub fn render(&self, node: &CompiledNode, ctx: &DataContext) -> Option<RenderedElement> {
        let mut stats = RenderStats::default();
        self.node(node, ctx, None, None, &mut stats)
    }

    /// Render a whole page from scratch.
    pub fn render_all(&self, nodes: &[CompiledNode], ctx: &DataContext) -> (Vec<RenderedElement>, RenderStats) {
        let mut stats = RenderStats::default();
        let tree = nodes
            .iter()
            .filter_map(|n| self.node(n, ctx, None, None, &mut stats))
            .collect();
        (tree, stats)
    }

    /// Render again after `changed` sources were written, taking unaffected
    /// subtrees from `prev`.
    pub fn rerender(
        &self,
        nodes: &[CompiledNode],
        prev: Vec<RenderedElement>,
        ctx: &DataContext,
        changed: &BTreeSet<String>,
    ) -> (Vec<RenderedElement>, RenderStats) {
        let mut stats = RenderStats::default();
        let mut old = by_key(prev);
        let tree = nodes
            .iter()
            .filter_map(|n| self.node(n, ctx, old.remove(&n.id), Some(changed), &mut stats))
            .collect();
        (tree, stats)
    }

    fn node(
        &self,
        node: &CompiledNode,
        ctx: &DataContext,
        prev: Option<RenderedElement>,
        changed: Option<&BTreeSet<String>>,
        stats: &mut RenderStats,
    ) -> Option<RenderedElement> {
        let touched = |deps: &BTreeSet<String>| changed.map_or(true, |c| deps.iter().any(|d| c.contains(d)));

        // Incremental pass: a node absent last time with unchanged inputs is
        // still hidden.
        if changed.is_some() && prev.is_none() && !touched(&node.deps) {
            return None;
        }

        let (mut el, mut old_children, child_changed) = match prev {
            Some(p) if !touched(&node.subtree_deps) => {
                stats.reused += p.size();
                return Some(p);
            }
            Some(mut p) if !touched(&node.deps) => {
                stats.reused += 1;
                let kids = by_key(std::mem::take(&mut p.children));
                (p, kids, changed)
            }
            prev => {
                let el = self.head(node, ctx)?;
                stats.rendered += 1;
                // Children of a node that was not on screen render in full.
                let (kids, child_changed) = match prev {
                    Some(p) => (by_key(p.children), changed),
                    None => (HashMap::new(), None),
                };
                (el, kids, child_changed)
            }
        };

        el.children = node
            .children
            .iter()
            .filter_map(|c| self.node(c, ctx, old_children.remove(&c.id), child_changed, stats))
            .collect();

        Some(el)
    }

    /// Everything about a node except its children.
    fn head(&self, node: &CompiledNode, ctx: &DataContext) -> Option<RenderedElement> {
        let scope = Scope::new(ctx);

        if let Some(cond) = &node.condition {
            let shown = match cond.eval(&self.evaluator, &scope) {
                Ok(v) => truthy(&v),
                Err(err) => {
                    tracing::debug!(node = %node.id, error = %err, "condition failed; node hidden");
                    false
                }
            };
            if !shown {
                return None;
            }
        }

        let props: Props = node
            .props
            .iter()
            .filter_map(|(name, p)| p.resolve(&self.evaluator, &scope).map(|v| (name.clone(), v)))
            .collect();
        let events: Vec<String> = node.events.keys().cloned().collect();

        let mut el = RenderedElement {
            key: node.id.clone(),
            type_name: node.kind.clone(),
            props,
            events,
            view: None,
            placeholder: None,
            children: Vec::new(),
        };

        let component = match self.registry.resolve(&node.kind) {
            Resolution::Found(c) => c,
            Resolution::NotFound => {
                tracing::warn!(node = %node.id, component = %node.kind, "unknown component type");
                el.placeholder = Some(Placeholder::UnknownType);
                return self.config.show_placeholders.then_some(el);
            }
            Resolution::LoadFailed(message) => {
                el.placeholder = Some(Placeholder::LoadFailed { message });
                return self.config.show_placeholders.then_some(el);
            }
        };

        if let Some(spec) = self.registry.spec(&node.kind) {
            for problem in spec.check_props(&el.props) {
                tracing::debug!(node = %node.id, component = %node.kind, %problem, "prop check");
            }
        }

        let vctx = ViewContext {
            key: &node.id,
            events: &el.events,
            child_count: node.children.len(),
        };
        match component.view(&el.props, &vctx) {
            Ok(view) => el.view = Some(view),
            Err(err) => {
                tracing::warn!(node = %node.id, component = %node.kind, error = %format!("{err:#}"), "component failed to render");
                el.placeholder = Some(Placeholder::RenderFailed {
                    message: format!("{err:#}"),
                });
            }
        }
        Some(el)
    }
}

fn by_key(elements: Vec<RenderedElement>) -> HashMap<String, RenderedElement> {
    elements.into_iter().map(|e| (e.key.clone(), e)).collect()
}

/// Render a single node with default limits.
pub fn render(node: &CompiledNode, ctx: &DataContext, registry: &Arc<ComponentRegistry>) -> Option<RenderedElement> {
    Renderer::new(registry.clone(), &EngineConfig::default()).render(node, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ComponentSpec;
    use assert_matches::assert_matches;
    use codeforge_core::model::{compile_page, PageSchema};
    use serde_json::json;

    fn registry() -> Arc<ComponentRegistry> {
        Arc::new(ComponentRegistry::builtin().unwrap())
    }

    fn compile(v: serde_json::Value) -> Vec<CompiledNode> {
        let schema = PageSchema::from_value(v).unwrap();
        compile_page(&schema, &EngineConfig::default()).unwrap().nodes
    }

    fn ctx(v: serde_json::Value) -> DataContext {
        DataContext::from_json(v)
    }

    #[test]
    fn resolves_props_and_keys() {
        let nodes = compile(json!({
            "id": "p",
            "dataSources": [{"id": "count", "type": "static", "defaultValue": 0}],
            "components": [{"id": "c", "type": "Text", "props": {"text": "Count: {{count}}"}}]
        }));
        let el = render(&nodes[0], &ctx(json!({"count": 3})), &registry()).unwrap();
        assert_eq!(el.key, "c");
        assert_eq!(el.props["text"], json!("Count: 3"));
        assert_eq!(el.view.unwrap().text_content(), "Count: 3");
    }

    #[test]
    fn unknown_type_is_a_placeholder_and_siblings_render() {
        let nodes = compile(json!({
            "id": "p",
            "components": [{"id": "root", "type": "Stack", "children": [
                {"id": "a", "type": "Text", "props": {"text": "A"}},
                {"id": "x", "type": "NonexistentWidget"},
                {"id": "b", "type": "Text", "props": {"text": "B"}}
            ]}]
        }));
        let el = render(&nodes[0], &DataContext::new(), &registry()).unwrap();
        assert_eq!(el.children.len(), 3);
        assert_matches!(el.children[1].placeholder, Some(Placeholder::UnknownType));
        assert!(el.children[1].view.is_none());
        assert!(!el.children[2].is_placeholder());
    }

    #[test]
    fn placeholders_can_be_suppressed() {
        let nodes = compile(json!({"id": "p", "components": [{"id": "x", "type": "Ghost"}]}));
        let mut cfg = EngineConfig::default();
        cfg.render.show_placeholders = false;
        let r = Renderer::new(registry(), &cfg);
        assert!(r.render(&nodes[0], &DataContext::new()).is_none());
    }

    #[test]
    fn failing_component_renders_error_placeholder() {
        let mut reg = ComponentRegistry::new();
        reg.register(
            ComponentSpec::new("Boom", "test"),
            Arc::new(|_: &Props, _: &ViewContext<'_>| -> anyhow::Result<View> { anyhow::bail!("kaput") }),
        )
        .unwrap();
        let nodes = compile(json!({"id": "p", "components": [{"id": "b", "type": "Boom"}]}));
        let el = render(&nodes[0], &DataContext::new(), &Arc::new(reg)).unwrap();
        assert_matches!(el.placeholder, Some(Placeholder::RenderFailed { message }) if message.contains("kaput"));
    }

    #[test]
    fn falsy_condition_hides_subtree() {
        let nodes = compile(json!({
            "id": "p",
            "dataSources": [{"id": "show", "type": "static", "defaultValue": false}],
            "components": [{"id": "d", "type": "Card", "condition": "show", "children": [
                {"id": "t", "type": "Text", "props": {"text": "hi"}}
            ]}]
        }));
        let reg = registry();
        assert!(render(&nodes[0], &ctx(json!({"show": false})), &reg).is_none());
        assert!(render(&nodes[0], &ctx(json!({"show": 1})), &reg).is_some());
    }

    #[test]
    fn rerender_reuses_untouched_subtrees() {
        let nodes = compile(json!({
            "id": "p",
            "dataSources": [
                {"id": "a", "type": "static", "defaultValue": 1},
                {"id": "b", "type": "static", "defaultValue": 2}
            ],
            "components": [{"id": "root", "type": "Stack", "children": [
                {"id": "ta", "type": "Text", "props": {"text": "{{a}}"}},
                {"id": "tb", "type": "Text", "props": {"text": "{{b}}"}},
                {"id": "plain", "type": "Text", "props": {"text": "static"}}
            ]}]
        }));
        let r = Renderer::new(registry(), &EngineConfig::default());
        let (tree, stats) = r.render_all(&nodes, &ctx(json!({"a": 1, "b": 2})));
        assert_eq!(stats.rendered, 4);

        let changed = BTreeSet::from(["a".to_string()]);
        let (tree, stats) = r.rerender(&nodes, tree, &ctx(json!({"a": 10, "b": 2})), &changed);
        assert_eq!(stats, RenderStats { rendered: 1, reused: 3 });
        assert_eq!(tree[0].find("ta").unwrap().props["text"], json!(10));
        assert_eq!(tree[0].find("tb").unwrap().props["text"], json!(2));
    }

    #[test]
    fn rerender_shows_node_whose_condition_turned_true() {
        let nodes = compile(json!({
            "id": "p",
            "dataSources": [{"id": "open", "type": "static", "defaultValue": false}],
            "components": [{"id": "dlg", "type": "Dialog", "condition": "open", "props": {"open": "{{open}}"},
                "children": [{"id": "body", "type": "Text", "props": {"text": "inside"}}]}]
        }));
        let r = Renderer::new(registry(), &EngineConfig::default());
        let (tree, _) = r.render_all(&nodes, &ctx(json!({"open": false})));
        assert!(tree.is_empty());

        let changed = BTreeSet::from(["open".to_string()]);
        let (tree, stats) = r.rerender(&nodes, tree, &ctx(json!({"open": true})), &changed);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(stats.rendered, 2);
    }
}
