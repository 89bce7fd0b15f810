//! Expression resolver.
//!
//! Resolves prop values against a data context. A value is one of:
//! - a literal JSON value (passed through unchanged)
//! - a template string with one or more `{{expr}}` segments
//! - a structured binding `{ source, path?, transform? }`
//!
//! The expression language is read-only: property access, indexing, arithmetic,
//! comparison, logical operators, the ternary, array/object literals, arrow
//! functions as method arguments, and a small set of string/array/number methods
//! plus `Math`, `Object`, `JSON`, `String`, `Number` and `Boolean` helpers.
//!
//! Resolution never fails outward: `resolve` returns `None` (`undefined`) for a
//! broken value and logs a diagnostic.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::ForgeResult;

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod template;

pub use eval::{is_global, truthy, Evaluator, Scope, Val};
pub use template::{is_template, Template};

/// A parsed expression together with its source text.
#[derive(Debug, Clone)]
pub struct Expr {
    source: Arc<str>,
    root: Arc<parser::Node>,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Expr {
    pub fn parse(src: &str) -> ForgeResult<Self> {
        let root = parser::parse(src)?;
        Ok(Self {
            source: Arc::from(src.trim()),
            root: Arc::new(root),
        })
    }

    /// Parse either a bare expression (`todos.length`) or one wrapped in a
    /// single template segment (`{{ todos.length }}`).
    pub fn parse_lenient(src: &str) -> ForgeResult<Self> {
        let trimmed = src.trim();
        if let Some(inner) = trimmed.strip_prefix("{{").and_then(|s| s.strip_suffix("}}")) {
            if !inner.contains("{{") {
                return Self::parse(inner);
            }
        }
        Self::parse(trimmed)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn node(&self) -> &parser::Node {
        &self.root
    }

    /// Free root identifiers referenced by the expression.
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.root.collect_refs(&mut Vec::new(), &mut out);
        out
    }

    pub fn eval(&self, ev: &Evaluator, scope: &Scope<'_>) -> ForgeResult<Val> {
        ev.eval(&self.root, scope)
    }
}

/// A structured binding: read a data source, drill into a path, transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub source: String,
    pub path: Vec<String>,
    /// Evaluated with `value` bound to the drilled value.
    pub transform: Option<Expr>,
}

impl Binding {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: Vec::new(),
            transform: None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = split_path(path);
        self
    }

    pub fn with_transform(mut self, transform: Expr) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        out.insert(self.source.clone());
        if let Some(t) = &self.transform {
            out.extend(t.references().into_iter().filter(|r| r != "value"));
        }
        out
    }

    fn resolve(&self, ev: &Evaluator, scope: &Scope<'_>) -> ForgeResult<Val> {
        let Some(root) = scope.context().get(&self.source) else {
            return Err(crate::errors::ForgeError::unknown_source(&self.source));
        };
        let drilled = drill(root, &self.path).cloned();
        match &self.transform {
            None => Ok(drilled),
            Some(t) => {
                let child = scope.child().with_var("value", drilled);
                t.eval(ev, &child)
            }
        }
    }
}

/// Split a dot path (`user.address.city`, `items.0.name`) into segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Follow a dot path. Missing segments yield `None`; numeric segments index arrays.
pub fn drill<'v>(root: &'v Value, path: &[String]) -> Option<&'v Value> {
    let mut cur = root;
    for seg in path {
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// A prop value compiled once at schema-load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolvable {
    Literal(Value),
    Template(Template),
    Binding(Binding),
}

impl Resolvable {
    /// Compile a raw JSON prop value: strings with `{{...}}` become templates,
    /// everything else is a literal.
    pub fn compile(raw: &Value) -> ForgeResult<Self> {
        match raw {
            Value::String(s) if is_template(s) => Ok(Self::Template(Template::parse(s)?)),
            other => Ok(Self::Literal(other.clone())),
        }
    }

    pub fn references(&self) -> BTreeSet<String> {
        match self {
            Self::Literal(_) => BTreeSet::new(),
            Self::Template(t) => t.references(),
            Self::Binding(b) => b.references(),
        }
    }

    /// Resolve against a scope. Never fails: errors are logged and become `None`.
    pub fn resolve(&self, ev: &Evaluator, scope: &Scope<'_>) -> Val {
        let out = match self {
            Self::Literal(v) => return Some(v.clone()),
            Self::Template(t) => t.eval(ev, scope),
            Self::Binding(b) => b.resolve(ev, scope),
        };
        match out {
            Ok(v) => v,
            Err(err) => {
                tracing::debug!(error = %err, "binding resolved to undefined");
                None
            }
        }
    }
}

/// Convenience: resolve a value against a data context with default limits.
pub fn resolve(value: &Resolvable, ctx: &crate::context::DataContext) -> Val {
    value.resolve(&Evaluator::default(), &Scope::new(ctx))
}
