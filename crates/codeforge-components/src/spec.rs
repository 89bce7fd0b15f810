//! Component descriptors.
//!
//! A spec is the static, data-only description of a component type: its type
//! name, the props it understands and the events it can fire. Specs back the
//! registry listing (`codeforge components`), prop checks during rendering and
//! any host UI that needs a palette of available components.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse prop type used for documentation and render-time checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl PropKind {
    pub fn accepts(&self, v: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => v.is_string(),
            Self::Number => v.is_number(),
            Self::Boolean => v.is_boolean(),
            Self::Array => v.is_array(),
            Self::Object => v.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropSpec {
    pub name: String,
    pub kind: PropKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Static description of one component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Case-sensitive type name used in page schemas, e.g. `"DataCard"`.
    #[serde(rename = "type")]
    pub type_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub props: Vec<PropSpec>,
    #[serde(default)]
    pub events: Vec<String>,
    /// Whether child nodes are rendered inside this component.
    #[serde(default)]
    pub accepts_children: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl ComponentSpec {
    pub fn new(type_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            category: category.into(),
            description: String::new(),
            props: Vec::new(),
            events: Vec::new(),
            accepts_children: false,
            meta: BTreeMap::new(),
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn prop(mut self, name: impl Into<String>, kind: PropKind) -> Self {
        self.props.push(PropSpec {
            name: name.into(),
            kind,
            required: false,
            description: String::new(),
        });
        self
    }

    pub fn required(mut self, name: impl Into<String>, kind: PropKind) -> Self {
        self.props.push(PropSpec {
            name: name.into(),
            kind,
            required: true,
            description: String::new(),
        });
        self
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.events.push(name.into());
        self
    }

    pub fn children(mut self) -> Self {
        self.accepts_children = true;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn prop_spec(&self, name: &str) -> Option<&PropSpec> {
        self.props.iter().find(|p| p.name == name)
    }

    /// Validate spec for basic quality constraints.
    pub fn validate(&self) -> Result<()> {
        if self.type_name.trim().is_empty() {
            anyhow::bail!("component type name is empty");
        }
        if !self.type_name.is_ascii() || self.type_name.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "component type name must be ASCII without whitespace: {:?}",
                self.type_name
            );
        }
        if self.category.trim().is_empty() {
            anyhow::bail!("component {} has no category", self.type_name);
        }
        let mut seen = std::collections::BTreeSet::new();
        for p in &self.props {
            if !seen.insert(p.name.as_str()) {
                anyhow::bail!("component {} declares prop {} twice", self.type_name, p.name);
            }
        }
        Ok(())
    }

    /// Problems with resolved props: missing required props and values of the
    /// wrong kind. Undeclared props are allowed.
    pub fn check_props(&self, props: &BTreeMap<String, Value>) -> Vec<String> {
        let mut problems = Vec::new();
        for p in &self.props {
            match props.get(&p.name) {
                None | Some(Value::Null) if p.required => {
                    problems.push(format!("missing required prop {}", p.name));
                }
                Some(v) if !v.is_null() && !p.kind.accepts(v) => {
                    problems.push(format!("prop {} expects {:?}", p.name, p.kind));
                }
                _ => {}
            }
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_rejects_bad_names() {
        assert!(ComponentSpec::new("Button", "input").validate().is_ok());
        assert!(ComponentSpec::new("", "input").validate().is_err());
        assert!(ComponentSpec::new("My Button", "input").validate().is_err());
        assert!(ComponentSpec::new("Button", "input")
            .prop("label", PropKind::String)
            .prop("label", PropKind::String)
            .validate()
            .is_err());
    }

    #[test]
    fn check_props_reports_missing_and_mistyped() {
        let spec = ComponentSpec::new("Heading", "display")
            .required("text", PropKind::Any)
            .prop("level", PropKind::Number);
        let problems = spec.check_props(&BTreeMap::from([("level".to_string(), json!("two"))]));
        assert_eq!(problems.len(), 2);
        assert!(spec
            .check_props(&BTreeMap::from([("text".to_string(), json!("Hi"))]))
            .is_empty());
    }
}
