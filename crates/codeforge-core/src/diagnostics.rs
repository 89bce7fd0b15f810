//! Structured diagnostics.
//!
//! Diagnostics are produced by schema compilation and by the renderer. They are
//! intended for:
//! - CLI printing
//! - API response payloads
//! - page-level error states in a host UI
//!
//! Codes are dot-delimited and stable (`schema.cycle`, `render.unknown_type`, ...).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: String,
    pub message: String,
    /// Location inside the page schema, e.g. `components[0].children[2].props.title`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, code, message)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, code, message)
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

/// An append-only diagnostic collector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, d: Diagnostic) {
        match d.level {
            DiagnosticLevel::Error => tracing::debug!(code = %d.code, path = ?d.path, "{}", d.message),
            _ => tracing::trace!(code = %d.code, path = ?d.path, "{}", d.message),
        }
        self.items.push(d);
    }

    pub fn push_warning(&mut self, code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) {
        self.push(Diagnostic::warning(code, message).at(path));
    }

    pub fn push_error(&mut self, code: impl Into<String>, message: impl Into<String>, path: impl Into<String>) {
        self.push(Diagnostic::error(code, message).at(path));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn warnings(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.items.iter().filter(|d| d.is_error()).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_level() {
        let mut d = Diagnostics::new();
        d.push_warning("a", "warn", "components[0]");
        d.push_error("b", "err", "dataSources[1]");
        d.push(Diagnostic::info("c", "info"));

        assert!(d.has_errors());
        assert_eq!(d.warnings(), 1);
        assert_eq!(d.errors().len(), 1);
        assert_eq!(d.errors()[0].path.as_deref(), Some("dataSources[1]"));
    }

    #[test]
    fn level_serializes_lowercase() {
        let v = serde_json::to_value(Diagnostic::warning("x", "y")).unwrap();
        assert_eq!(v["level"], "warning");
        assert!(v.get("path").is_none());
    }
}
