//! Configuration structures for codeforge-core.
//!
//! This module defines explicit, serializable configuration objects used by
//! higher-level components (renderer, CLI, API) to bound the work a single page
//! schema can cause.
//!
//! The core crate itself does not read environment variables or files. Hosts
//! load configuration and pass it in.

use serde::{Deserialize, Serialize};

use crate::errors::{ForgeError, ForgeResult};

/// Global configuration container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Resource and complexity limits applied while compiling and evaluating a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a page schema document.
    pub max_schema_bytes: usize,
    /// Maximum nesting depth of the component tree.
    pub max_tree_depth: usize,
    /// Maximum number of component nodes in one page.
    pub max_nodes: usize,
    /// Maximum number of declared data sources.
    pub max_data_sources: usize,
    /// Maximum source length of a single `{{...}}` expression.
    pub max_expression_len: usize,
    /// Maximum recursion depth while evaluating an expression.
    pub max_eval_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_schema_bytes: 2 * 1024 * 1024,
            max_tree_depth: 64,
            max_nodes: 10_000,
            max_data_sources: 1_000,
            max_expression_len: 4 * 1024,
            max_eval_depth: 128,
        }
    }
}

/// Renderer behaviour toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Emit a visible placeholder for unknown component types. When disabled the
    /// node is dropped from the output (still recorded as a diagnostic).
    pub show_placeholders: bool,
    /// Include the resolved props as `data-*` attributes in HTML output.
    pub debug_attributes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            show_placeholders: true,
            debug_attributes: false,
        }
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &EngineConfig) -> ForgeResult<()> {
    if cfg.limits.max_nodes == 0 {
        return Err(ForgeError::invalid_argument(
            "max_nodes must be greater than zero",
        ));
    }

    if cfg.limits.max_tree_depth == 0 {
        return Err(ForgeError::invalid_argument(
            "max_tree_depth must be greater than zero",
        ));
    }

    if cfg.limits.max_eval_depth < 8 {
        return Err(ForgeError::invalid_argument(
            "max_eval_depth must be at least 8",
        ));
    }

    if cfg.limits.max_expression_len > cfg.limits.max_schema_bytes {
        return Err(ForgeError::invalid_argument(
            "max_expression_len must not exceed max_schema_bytes",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = EngineConfig::default();
        validate_config(&cfg).unwrap();
    }

    #[test]
    fn invalid_limits_detected() {
        let mut cfg = EngineConfig::default();
        cfg.limits.max_expression_len = cfg.limits.max_schema_bytes + 1;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn zero_nodes_detected() {
        let mut cfg = EngineConfig::default();
        cfg.limits.max_nodes = 0;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"limits":{"max_nodes":5}}"#).unwrap();
        assert_eq!(cfg.limits.max_nodes, 5);
        assert_eq!(cfg.limits.max_tree_depth, 64);
        assert!(cfg.render.show_placeholders);
    }
}
