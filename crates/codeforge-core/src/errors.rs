//! Error types for codeforge-core.
//!
//! The engine distinguishes four failure classes:
//! - configuration errors, detected while a page schema is compiled
//! - resolution errors, which never leave the expression resolver
//! - action errors, which turn a single action into a no-op
//! - persistence errors, which degrade a `kv` source to memory-only
//!
//! Only the first and last class are represented as `ForgeError` values that
//! callers can observe. Resolution and action failures are logged and absorbed
//! at the layer where they happen.

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Result alias used throughout the core crate.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Errors surfaced by the core crate.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A caller passed an argument that violates an API precondition.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The page schema failed validation. Carries every collected error.
    #[error("invalid page schema: {}", summarize(.0))]
    InvalidSchema(Vec<Diagnostic>),

    /// A data source id was read or written without being declared.
    #[error("unknown data source: {0}")]
    UnknownSource(String),

    /// An expression could not be parsed.
    #[error("expression syntax error at {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// An expression failed at evaluation time.
    #[error("evaluation error: {0}")]
    Eval(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The storage collaborator rejected an operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// An internal invariant was violated.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl ForgeError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self::Eval(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn unknown_source(id: impl Into<String>) -> Self {
        Self::UnknownSource(id.into())
    }

    /// Stable machine-readable code for API and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::InvalidSchema(_) => "invalid_schema",
            Self::UnknownSource(_) => "unknown_source",
            Self::Syntax { .. } => "syntax",
            Self::Eval(_) => "eval",
            Self::Serialization(_) => "serialization",
            Self::Storage(_) => "storage",
            Self::Invariant(_) => "invariant",
        }
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

fn summarize(diags: &[Diagnostic]) -> String {
    match diags {
        [] => "no diagnostics".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
    }
}
