//! codeforge-core
//!
//! Core primitives for the CodeForge JSON-UI engine:
//! - Page schema model and load-time compilation/validation
//! - Expression resolver for `{{...}}` templates and structured bindings
//! - Data-source registry (`kv`, `static`, `computed`) with dependency-ordered recompute
//! - Storage contract and background persistence queue
//! - Action dispatcher with notification/navigation collaborators

pub mod action;
pub mod config;
pub mod context;
pub mod datasource;
pub mod diagnostics;
pub mod errors;
pub mod expr;
pub mod model;
pub mod persist;
pub mod storage;

pub use crate::errors::{ForgeError, ForgeResult};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::action::{ActionDispatcher, CompiledAction, Effects, EffectLog, Navigator, Notifier, Toast};
    pub use crate::config::{validate_config, EngineConfig, LimitsConfig, RenderConfig};
    pub use crate::context::DataContext;
    pub use crate::datasource::{DataSourceRegistry, SetOutcome, SourceDef};
    pub use crate::diagnostics::{Diagnostic, DiagnosticLevel, Diagnostics};
    pub use crate::expr::{resolve, Binding, Evaluator, Expr, Resolvable, Scope, Val};
    pub use crate::model::{
        compile_page, validate_page, ActionDecl, ActionType, CompiledNode, CompiledPage, ComponentNode,
        DataSourceDecl, PageSchema, PropValue, SourceKind, ValidationReport,
    };
    pub use crate::persist::{PersistHandle, Persister};
    pub use crate::storage::{KvStorage, MemoryStorage};
    pub use crate::{ForgeError, ForgeResult};
}
