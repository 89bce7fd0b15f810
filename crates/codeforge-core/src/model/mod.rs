//! Page schema data model.
//!
//! These types mirror the JSON document one-to-one (camelCase field names) and
//! are deliberately loose: closed sets such as the data-source `type` or the
//! action `type` are kept as strings here so that an unknown value becomes a
//! collected diagnostic during compilation instead of an opaque serde error.
//! Compilation into typed, pre-parsed structures lives in [`compile`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ForgeError, ForgeResult};

pub mod compile;

pub use compile::{
    compile_page, validate_page, CompiledNode, CompiledPage, PropValue, ValidationReport,
};

/// Root declarative unit: one page's data sources and component tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSchema {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form layout hints for the host; not interpreted by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
    #[serde(default)]
    pub data_sources: Vec<DataSourceDecl>,
    #[serde(default)]
    pub components: Vec<ComponentNode>,
}

impl PageSchema {
    /// Parse a page schema from JSON bytes, refusing documents above `max_bytes`.
    pub fn from_slice(bytes: &[u8], max_bytes: usize) -> ForgeResult<Self> {
        if bytes.len() > max_bytes {
            return Err(ForgeError::invalid_argument(format!(
                "page schema exceeds max_bytes ({} > {})",
                bytes.len(),
                max_bytes
            )));
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_value(v: Value) -> ForgeResult<Self> {
        Ok(serde_json::from_value(v)?)
    }

    /// Depth-first walk over every component node, parents before children.
    pub fn walk(&self) -> impl Iterator<Item = &ComponentNode> {
        let mut stack: Vec<&ComponentNode> = self.components.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// The closed set of data-source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Kv,
    Static,
    Computed,
}

impl SourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kv" => Some(Self::Kv),
            "static" => Some(Self::Static),
            "computed" => Some(Self::Computed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kv => "kv",
            Self::Static => "static",
            Self::Computed => "computed",
        }
    }
}

/// One named slot of page-level state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDecl {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Persistence key for `kv` sources; the id is used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Expression evaluated against the data context for `computed` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl DataSourceDecl {
    pub fn kv(id: impl Into<String>, default_value: Value) -> Self {
        Self::new(id, SourceKind::Kv).with_default(default_value)
    }

    pub fn static_value(id: impl Into<String>, default_value: Value) -> Self {
        Self::new(id, SourceKind::Static).with_default(default_value)
    }

    pub fn computed<I, S>(id: impl Into<String>, compute: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut d = Self::new(id, SourceKind::Computed);
        d.compute = Some(compute.into());
        d.dependencies = deps.into_iter().map(Into::into).collect();
        d
    }

    fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind: kind.as_str().to_string(),
            key: None,
            default_value: None,
            compute: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_default(mut self, v: Value) -> Self {
        self.default_value = Some(v);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::parse(&self.kind)
    }
}

/// Structured prop binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingDecl {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

/// One declarative UI element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, BindingDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, Vec<ActionDecl>>,
    /// Expression; the node is skipped when it resolves falsy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl ComponentNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: BTreeMap::new(),
            bindings: BTreeMap::new(),
            children: Vec::new(),
            events: BTreeMap::new(),
            condition: None,
        }
    }

    pub fn prop(mut self, name: impl Into<String>, v: Value) -> Self {
        self.props.insert(name.into(), v);
        self
    }

    pub fn child(mut self, node: ComponentNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn on(mut self, event: impl Into<String>, actions: Vec<ActionDecl>) -> Self {
        self.events.insert(event.into(), actions);
        self
    }
}

/// The closed set of action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    SetValue,
    ToggleValue,
    Increment,
    Decrement,
    ShowToast,
    Navigate,
    OpenDialog,
    CloseDialog,
}

impl ActionType {
    pub const ALL: [ActionType; 11] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::SetValue,
        Self::ToggleValue,
        Self::Increment,
        Self::Decrement,
        Self::ShowToast,
        Self::Navigate,
        Self::OpenDialog,
        Self::CloseDialog,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SetValue => "set-value",
            Self::ToggleValue => "toggle-value",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
            Self::ShowToast => "show-toast",
            Self::Navigate => "navigate",
            Self::OpenDialog => "open-dialog",
            Self::CloseDialog => "close-dialog",
        }
    }

    /// Whether the action writes a data source (and so needs a `target`).
    pub fn needs_target(&self) -> bool {
        !matches!(self, Self::ShowToast | Self::Navigate)
    }
}

/// One effect to apply when an event fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDecl {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Expression with `event` in scope; wins over `valueFrom` and `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,
    /// Dot path into the event payload; `"event"` means the whole payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
    /// Nested field written by `set-value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
}

impl ActionDecl {
    pub fn new(kind: ActionType) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            ..Self::default()
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn value(mut self, v: Value) -> Self {
        self.value = Some(v);
        self
    }

    pub fn compute(mut self, expr: impl Into<String>) -> Self {
        self.compute = Some(expr.into());
        self
    }

    pub fn action_type(&self) -> Option<ActionType> {
        ActionType::parse(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_camel_case_schema() {
        let schema = PageSchema::from_value(json!({
            "id": "todos",
            "dataSources": [
                {"id": "todos", "type": "kv", "key": "app-todos", "defaultValue": []},
                {"id": "stats", "type": "computed", "compute": "({total: todos.length})", "dependencies": ["todos"]}
            ],
            "components": [
                {"id": "root", "type": "Stack", "children": [
                    {"id": "add", "type": "Button", "events": {"onClick": [
                        {"type": "create", "target": "todos", "valueFrom": "event"}
                    ]}}
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(schema.data_sources[0].source_kind(), Some(SourceKind::Kv));
        assert_eq!(schema.data_sources[0].key.as_deref(), Some("app-todos"));
        assert_eq!(schema.data_sources[1].dependencies, vec!["todos"]);
        let ids: Vec<_> = schema.walk().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "add"]);
        let action = &schema.components[0].children[0].events["onClick"][0];
        assert_eq!(action.action_type(), Some(ActionType::Create));
        assert_eq!(action.value_from.as_deref(), Some("event"));
    }

    #[test]
    fn unknown_kinds_survive_parsing() {
        let d: DataSourceDecl = serde_json::from_value(json!({"id": "x", "type": "redis"})).unwrap();
        assert_eq!(d.source_kind(), None);
        assert_eq!(ActionType::parse("explode"), None);
    }

    #[test]
    fn action_type_names_are_kebab_case() {
        for t in ActionType::ALL {
            assert_eq!(ActionType::parse(t.as_str()), Some(t));
            assert_eq!(serde_json::to_value(t).unwrap(), json!(t.as_str()));
        }
    }

    #[test]
    fn oversized_schema_is_rejected() {
        let err = PageSchema::from_slice(br#"{"id":"p"}"#, 4).unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }
}
