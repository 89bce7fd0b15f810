//! Page schema compilation.
//!
//! Turns a [`PageSchema`] into a [`CompiledPage`]: every prop is classified
//! once into a [`PropValue`], every expression is parsed, data sources become
//! typed [`SourceDef`]s and each node records which sources it reads.
//!
//! All configuration problems are collected rather than failing on the first:
//! - unknown data-source type, action type
//! - duplicate data-source or node id
//! - dependency on an undeclared source, dependency cycle
//! - binding or action target naming an undeclared source
//! - unparsable expression, size limits
//!
//! Inline templates that mention an undeclared name only warn: the prop
//! resolves to `undefined` at render time.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::action::CompiledAction;
use crate::config::EngineConfig;
use crate::datasource::{DependencyGraph, SourceDef};
use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
use crate::errors::{ForgeError, ForgeResult};
use crate::expr::{is_global, split_path, Binding, Expr, Resolvable};
use crate::model::{ComponentNode, DataSourceDecl, PageSchema, SourceKind};

/// A compiled prop value.
pub type PropValue = Resolvable;

/// Outcome of validating a page schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    fn from_diagnostics(diags: Diagnostics) -> Self {
        let mut diagnostics = diags.into_vec();
        // Errors first; stable within a level.
        diagnostics.sort_by(|a, b| b.level.cmp(&a.level));
        let ok = !diagnostics.iter().any(Diagnostic::is_error);
        Self { ok, diagnostics }
    }

    pub fn has_errors(&self) -> bool {
        !self.ok
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
    }
}

/// A component node with every prop, binding, condition and action compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledNode {
    pub id: String,
    pub kind: String,
    /// Inline props with bindings merged over same-named entries.
    pub props: BTreeMap<String, PropValue>,
    pub condition: Option<Expr>,
    pub events: BTreeMap<String, Vec<CompiledAction>>,
    pub children: Vec<CompiledNode>,
    /// Data sources read by this node's own props and condition.
    pub deps: BTreeSet<String>,
    /// `deps` of this node and every descendant.
    pub subtree_deps: BTreeSet<String>,
}

impl CompiledNode {
    pub fn find(&self, id: &str) -> Option<&CompiledNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

#[derive(Debug, Clone)]
pub struct CompiledPage {
    pub id: String,
    pub name: Option<String>,
    /// Opaque layout hints, passed through untouched.
    pub layout: Option<serde_json::Value>,
    pub sources: Vec<SourceDef>,
    pub nodes: Vec<CompiledNode>,
    /// Warnings collected while compiling (errors abort compilation).
    pub report: ValidationReport,
}

impl CompiledPage {
    pub fn find_node(&self, id: &str) -> Option<&CompiledNode> {
        self.nodes.iter().find_map(|n| n.find(id))
    }

    pub fn node_count(&self) -> usize {
        fn count(n: &CompiledNode) -> usize {
            1 + n.children.iter().map(count).sum::<usize>()
        }
        self.nodes.iter().map(count).sum()
    }
}

/// Compile a page. Any error-level diagnostic fails with
/// [`ForgeError::InvalidSchema`] carrying every diagnostic.
pub fn compile_page(schema: &PageSchema, cfg: &EngineConfig) -> ForgeResult<CompiledPage> {
    let (page, report) = compile_inner(schema, cfg);
    if report.has_errors() {
        return Err(ForgeError::InvalidSchema(report.diagnostics));
    }
    tracing::debug!(
        page = %page.id,
        sources = page.sources.len(),
        nodes = page.node_count(),
        warnings = report.warnings().count(),
        "page compiled"
    );
    Ok(CompiledPage { report, ..page })
}

/// Validate without keeping the compiled form.
pub fn validate_page(schema: &PageSchema, cfg: &EngineConfig) -> ValidationReport {
    compile_inner(schema, cfg).1
}

fn compile_inner(schema: &PageSchema, cfg: &EngineConfig) -> (CompiledPage, ValidationReport) {
    let mut diags = Diagnostics::new();
    if schema.id.trim().is_empty() {
        diags.push_error("schema.missing_id", "page id must not be empty", "id");
    }

    let sources = compile_sources(&schema.data_sources, cfg, &mut diags);
    let mut kinds: BTreeMap<String, SourceKind> = BTreeMap::new();
    for d in &schema.data_sources {
        if let Some(k) = d.source_kind() {
            kinds.entry(d.id.clone()).or_insert(k);
        }
    }

    let mut walker = NodeWalker {
        cfg,
        kinds: &kinds,
        diags: &mut diags,
        seen: HashSet::new(),
        count: 0,
    };
    let nodes = schema
        .components
        .iter()
        .enumerate()
        .filter_map(|(i, n)| walker.node(n, &format!("components[{i}]"), 1))
        .collect();

    let page = CompiledPage {
        id: schema.id.clone(),
        name: schema.name.clone(),
        layout: schema.layout.clone(),
        sources,
        nodes,
        report: ValidationReport::default(),
    };
    (page, ValidationReport::from_diagnostics(diags))
}

fn compile_sources(decls: &[DataSourceDecl], cfg: &EngineConfig, diags: &mut Diagnostics) -> Vec<SourceDef> {
    if decls.len() > cfg.limits.max_data_sources {
        diags.push_error(
            "schema.limit",
            format!(
                "too many data sources ({} > {})",
                decls.len(),
                cfg.limits.max_data_sources
            ),
            "dataSources",
        );
    }

    let declared: HashSet<&str> = decls.iter().map(|d| d.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(decls.len());

    for (i, d) in decls.iter().enumerate() {
        let at = format!("dataSources[{i}]");
        if d.id.trim().is_empty() {
            diags.push_error("schema.missing_id", "data source id must not be empty", at.clone());
            continue;
        }
        if !seen.insert(d.id.as_str()) {
            diags.push_error(
                "schema.duplicate_source",
                format!("duplicate data source id: {}", d.id),
                at.clone(),
            );
            continue;
        }
        let Some(kind) = d.source_kind() else {
            diags.push_error(
                "schema.unknown_source_type",
                format!("data source {} has unknown type {:?}", d.id, d.kind),
                format!("{at}.type"),
            );
            continue;
        };

        if kind != SourceKind::Computed && !d.dependencies.is_empty() {
            diags.push_warning(
                "schema.ignored_dependencies",
                format!("{} source {} ignores its dependencies", kind.as_str(), d.id),
                format!("{at}.dependencies"),
            );
        }

        let default = d.default_value.clone().unwrap_or(serde_json::Value::Null);
        match kind {
            SourceKind::Kv => out.push(SourceDef::kv(
                d.id.clone(),
                d.key.clone().unwrap_or_else(|| d.id.clone()),
                default,
            )),
            SourceKind::Static => out.push(SourceDef::static_value(d.id.clone(), default)),
            SourceKind::Computed => {
                let Some(src) = d.compute.as_deref() else {
                    diags.push_error(
                        "schema.missing_compute",
                        format!("computed source {} has no compute expression", d.id),
                        at.clone(),
                    );
                    continue;
                };
                let Some(expr) = parse_expr(src, &format!("{at}.compute"), cfg, diags) else {
                    continue;
                };

                let mut deps_ok = true;
                for dep in &d.dependencies {
                    if !declared.contains(dep.as_str()) {
                        diags.push_error(
                            "schema.unknown_dependency",
                            format!("data source {} depends on undeclared source {dep}", d.id),
                            format!("{at}.dependencies"),
                        );
                        deps_ok = false;
                    }
                }
                for r in expr.references() {
                    if declared.contains(r.as_str()) && !d.dependencies.contains(&r) {
                        diags.push_warning(
                            "schema.undeclared_dependency",
                            format!(
                                "computed source {} reads {r} without listing it in dependencies; it will not refresh when {r} changes",
                                d.id
                            ),
                            format!("{at}.dependencies"),
                        );
                    } else if !declared.contains(r.as_str()) && !is_global(&r) {
                        diags.push_warning(
                            "schema.unknown_reference",
                            format!("computed source {} reads undeclared name {r}", d.id),
                            format!("{at}.compute"),
                        );
                    }
                }
                if deps_ok {
                    out.push(SourceDef::computed(d.id.clone(), expr, d.dependencies.clone()));
                }
            }
        }
    }

    // A source dropped above takes its dependents with it.
    loop {
        let kept: HashSet<String> = out.iter().map(|s| s.id().to_string()).collect();
        let Some(pos) = out
            .iter()
            .position(|s| s.dependencies().iter().any(|dep| !kept.contains(dep)))
        else {
            break;
        };
        let skipped = out.remove(pos);
        let missing = skipped
            .dependencies()
            .iter()
            .filter(|dep| !kept.contains(*dep))
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let at = decls
            .iter()
            .position(|d| d.id == skipped.id())
            .map(|i| format!("dataSources[{i}]"))
            .unwrap_or_else(|| "dataSources".to_string());
        diags.push_warning(
            "schema.skipped_source",
            format!("data source {} skipped: dependency {missing} failed to compile", skipped.id()),
            at,
        );
    }

    if let Err(e) = DependencyGraph::build(out.iter().map(|s| (s.id(), s.dependencies()))) {
        diags.push(e.to_diagnostic());
    }
    out
}

struct NodeWalker<'a> {
    cfg: &'a EngineConfig,
    kinds: &'a BTreeMap<String, SourceKind>,
    diags: &'a mut Diagnostics,
    seen: HashSet<String>,
    count: usize,
}

impl NodeWalker<'_> {
    fn node(&mut self, n: &ComponentNode, at: &str, depth: usize) -> Option<CompiledNode> {
        if depth > self.cfg.limits.max_tree_depth {
            self.diags.push_error(
                "schema.limit",
                format!("component tree deeper than {}", self.cfg.limits.max_tree_depth),
                at,
            );
            return None;
        }
        self.count += 1;
        if self.count == self.cfg.limits.max_nodes + 1 {
            self.diags.push_error(
                "schema.limit",
                format!("more than {} component nodes", self.cfg.limits.max_nodes),
                at,
            );
        }
        if n.id.trim().is_empty() {
            self.diags.push_error("schema.missing_id", "component id must not be empty", at);
        } else if !self.seen.insert(n.id.clone()) {
            self.diags.push_error(
                "schema.duplicate_node",
                format!("duplicate component id: {}", n.id),
                at,
            );
        }
        if n.kind.trim().is_empty() {
            self.diags.push_error(
                "schema.missing_type",
                format!("component {} has no type", n.id),
                format!("{at}.type"),
            );
        }

        let mut props = BTreeMap::new();
        for (name, raw) in &n.props {
            let p = format!("{at}.props.{name}");
            if let Some(r) = self.prop(raw, &p) {
                self.check_refs(&r.references(), &[], &p);
                props.insert(name.clone(), r);
            }
        }

        for (name, b) in &n.bindings {
            let p = format!("{at}.bindings.{name}");
            if !self.kinds.contains_key(&b.source) {
                self.diags.push_error(
                    "schema.unknown_binding_source",
                    format!("binding {name} of {} reads undeclared source {}", n.id, b.source),
                    p,
                );
                continue;
            }
            let mut binding = Binding::new(b.source.clone());
            binding.path = b.path.as_deref().map(split_path).unwrap_or_default();
            if let Some(t) = &b.transform {
                let Some(expr) = parse_expr(t, &format!("{p}.transform"), self.cfg, self.diags) else {
                    continue;
                };
                self.check_refs(&expr.references(), &["value"], &p);
                binding.transform = Some(expr);
            }
            if props.insert(name.clone(), Resolvable::Binding(binding)).is_some() {
                tracing::debug!(node = %n.id, prop = %name, "binding overrides inline prop");
            }
        }

        let condition = n.condition.as_deref().and_then(|c| {
            let p = format!("{at}.condition");
            let expr = parse_expr(c, &p, self.cfg, self.diags)?;
            self.check_refs(&expr.references(), &[], &p);
            Some(expr)
        });

        let mut events = BTreeMap::new();
        for (event, decls) in &n.events {
            let mut actions = Vec::with_capacity(decls.len());
            for (i, decl) in decls.iter().enumerate() {
                let p = format!("{at}.events.{event}[{i}]");
                let Some(action) = CompiledAction::compile(decl, &p, self.diags) else {
                    continue;
                };
                if let Some(target) = &action.target {
                    match self.kinds.get(target) {
                        None => self.diags.push_error(
                            "schema.unknown_target",
                            format!("action targets undeclared source {target}"),
                            format!("{p}.target"),
                        ),
                        Some(SourceKind::Computed) if action.kind.needs_target() => self.diags.push_error(
                            "schema.readonly_target",
                            format!("action targets computed source {target}"),
                            format!("{p}.target"),
                        ),
                        Some(_) => {}
                    }
                }
                self.check_refs(&action.references(), &[], &p);
                actions.push(action);
            }
            events.insert(event.clone(), actions);
        }

        let children: Vec<CompiledNode> = n
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| self.node(c, &format!("{at}.children[{i}]"), depth + 1))
            .collect();

        let mut deps: BTreeSet<String> = props.values().flat_map(Resolvable::references).collect();
        if let Some(c) = &condition {
            deps.extend(c.references());
        }
        deps.retain(|d| self.kinds.contains_key(d));
        let mut subtree_deps = deps.clone();
        for c in &children {
            subtree_deps.extend(c.subtree_deps.iter().cloned());
        }

        Some(CompiledNode {
            id: n.id.clone(),
            kind: n.kind.clone(),
            props,
            condition,
            events,
            children,
            deps,
            subtree_deps,
        })
    }

    fn prop(&mut self, raw: &serde_json::Value, at: &str) -> Option<PropValue> {
        if let serde_json::Value::String(s) = raw {
            if s.len() > self.cfg.limits.max_expression_len && crate::expr::is_template(s) {
                self.diags.push_error(
                    "schema.limit",
                    format!("expression longer than {} bytes", self.cfg.limits.max_expression_len),
                    at,
                );
                return None;
            }
        }
        match Resolvable::compile(raw) {
            Ok(r) => Some(r),
            Err(e) => {
                self.diags.push_error("schema.expression", e.to_string(), at);
                None
            }
        }
    }

    /// Warn about names that are neither declared sources, scope locals nor globals.
    fn check_refs(&mut self, refs: &BTreeSet<String>, locals: &[&str], at: &str) {
        for r in refs {
            if self.kinds.contains_key(r) || locals.contains(&r.as_str()) || is_global(r) {
                continue;
            }
            self.diags.push_warning(
                "schema.unknown_reference",
                format!("{r} is not a declared data source; it resolves to undefined"),
                at,
            );
        }
    }
}

fn parse_expr(src: &str, at: &str, cfg: &EngineConfig, diags: &mut Diagnostics) -> Option<Expr> {
    if src.len() > cfg.limits.max_expression_len {
        diags.push_error(
            "schema.limit",
            format!("expression longer than {} bytes", cfg.limits.max_expression_len),
            at,
        );
        return None;
    }
    match Expr::parse_lenient(src) {
        Ok(e) => Some(e),
        Err(e) => {
            diags.push_error("schema.expression", e.to_string(), at);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn schema(v: serde_json::Value) -> PageSchema {
        PageSchema::from_value(v).unwrap()
    }

    fn codes(report: &ValidationReport) -> Vec<&str> {
        report.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn compiles_todo_page() {
        let page = compile_page(
            &schema(json!({
                "id": "todos",
                "dataSources": [
                    {"id": "todos", "type": "kv", "defaultValue": []},
                    {"id": "stats", "type": "computed", "compute": "({total: todos.length})", "dependencies": ["todos"]},
                    {"id": "title", "type": "static", "defaultValue": "Todos"}
                ],
                "components": [{
                    "id": "root", "type": "Card", "props": {"title": "{{title}}"},
                    "children": [
                        {"id": "total", "type": "Text", "props": {"text": "Total: {{stats.total}}"}},
                        {"id": "add", "type": "Button", "props": {"label": "Add"},
                         "events": {"onClick": [{"type": "create", "target": "todos", "valueFrom": "event"}]}}
                    ]
                }]
            })),
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(page.sources.len(), 3);
        assert_matches!(&page.sources[0], SourceDef::Kv { key, .. } if key == "todos");
        assert_eq!(page.node_count(), 3);
        let root = &page.nodes[0];
        assert_eq!(root.deps, BTreeSet::from(["title".to_string()]));
        assert_eq!(
            root.subtree_deps,
            BTreeSet::from(["stats".to_string(), "title".to_string()])
        );
        let add = page.find_node("add").unwrap();
        assert_eq!(add.events["onClick"].len(), 1);
        assert!(add.deps.is_empty());
    }

    #[test]
    fn bindings_override_inline_props() {
        let page = compile_page(
            &schema(json!({
                "id": "p",
                "dataSources": [{"id": "user", "type": "static", "defaultValue": {"name": "Ada"}}],
                "components": [{
                    "id": "n", "type": "Text",
                    "props": {"text": "inline"},
                    "bindings": {"text": {"source": "user", "path": "name", "transform": "value.toUpperCase()"}}
                }]
            })),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_matches!(&page.nodes[0].props["text"], Resolvable::Binding(b) if b.source == "user" && b.path == ["name"]);
    }

    #[test]
    fn collects_every_configuration_error() {
        let report = validate_page(
            &schema(json!({
                "id": "p",
                "dataSources": [
                    {"id": "a", "type": "computed", "compute": "b + 1", "dependencies": ["b"]},
                    {"id": "b", "type": "computed", "compute": "a + 1", "dependencies": ["a"]},
                    {"id": "c", "type": "redis"},
                    {"id": "d", "type": "computed", "compute": "x", "dependencies": ["missing"]}
                ],
                "components": [
                    {"id": "dup", "type": "Text", "bindings": {"text": {"source": "ghost"}}},
                    {"id": "dup", "type": "Button", "events": {"onClick": [
                        {"type": "increment", "target": "nowhere"},
                        {"type": "set-value", "target": "a", "value": 1},
                        {"type": "teleport"}
                    ]}},
                    {"id": "bad", "type": "Text", "props": {"text": "{{ 1 + }}"}}
                ]
            })),
            &EngineConfig::default(),
        );
        assert!(report.has_errors());
        let codes = codes(&report);
        for expected in [
            "schema.cycle",
            "schema.unknown_source_type",
            "schema.unknown_dependency",
            "schema.duplicate_node",
            "schema.unknown_binding_source",
            "schema.unknown_target",
            "schema.readonly_target",
            "schema.unknown_action",
            "schema.expression",
        ] {
            assert!(codes.contains(&expected), "missing {expected} in {codes:?}");
        }
        assert!(report.diagnostics[0].is_error());
    }

    #[test]
    fn unknown_inline_reference_only_warns() {
        let page = compile_page(
            &schema(json!({
                "id": "p",
                "components": [{"id": "t", "type": "Text", "props": {"text": "{{nonexistent.field}}"}}]
            })),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(codes(&page.report), vec!["schema.unknown_reference"]);
        assert!(page.nodes[0].deps.is_empty());
    }

    #[test]
    fn invalid_schema_error_carries_diagnostics() {
        let err = compile_page(
            &schema(json!({"id": "p", "dataSources": [{"id": "x", "type": "nope"}]})),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_matches!(err, ForgeError::InvalidSchema(d) if d[0].code == "schema.unknown_source_type");
    }

    #[test]
    fn tree_depth_limit_is_enforced() {
        let mut cfg = EngineConfig::default();
        cfg.limits.max_tree_depth = 2;
        let report = validate_page(
            &schema(json!({
                "id": "p",
                "components": [{"id": "a", "type": "Stack", "children": [
                    {"id": "b", "type": "Stack", "children": [{"id": "c", "type": "Text"}]}
                ]}]
            })),
            &cfg,
        );
        assert_eq!(codes(&report), vec!["schema.limit"]);
    }

    #[test]
    fn dropped_source_skips_dependents_without_dangling_errors() {
        let report = validate_page(
            &schema(json!({
                "id": "p",
                "dataSources": [
                    {"id": "base", "type": "computed", "dependencies": []},
                    {"id": "double", "type": "computed", "compute": "base * 2", "dependencies": ["base"]},
                    {"id": "quad", "type": "computed", "compute": "double * 2", "dependencies": ["double"]}
                ]
            })),
            &EngineConfig::default(),
        );
        let codes = codes(&report);
        assert!(!codes.contains(&"schema.unknown_dependency"), "{codes:?}");
        assert_eq!(
            codes,
            vec!["schema.missing_compute", "schema.skipped_source", "schema.skipped_source"]
        );
    }

    #[test]
    fn layout_passes_through_untouched() {
        let layout = json!({"columns": 2, "areas": [["header", "header"], ["nav", "main"]]});
        let parsed = schema(json!({"id": "p", "layout": layout.clone()}));
        assert_eq!(parsed.layout.as_ref(), Some(&layout));
        let page = compile_page(&parsed, &EngineConfig::default()).unwrap();
        assert_eq!(page.layout, Some(layout.clone()));
        assert_eq!(serde_json::to_value(&parsed).unwrap()["layout"], layout);

        let bare = schema(json!({"id": "q"}));
        assert!(bare.layout.is_none());
        assert!(serde_json::to_value(&bare).unwrap().get("layout").is_none());
    }

    #[test]
    fn compute_reading_unlisted_source_warns() {
        let report = validate_page(
            &schema(json!({
                "id": "p",
                "dataSources": [
                    {"id": "a", "type": "static", "defaultValue": 1},
                    {"id": "b", "type": "computed", "compute": "{{ a * 2 }}"}
                ]
            })),
            &EngineConfig::default(),
        );
        assert!(report.ok);
        assert_eq!(codes(&report), vec!["schema.undeclared_dependency"]);
    }
}
