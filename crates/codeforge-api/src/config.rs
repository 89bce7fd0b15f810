//! Service configuration, read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `DATABASE_PATH` | `/data/codeforge.db` |
//! | `PORT` | `5001` |
//! | `HOST` | `0.0.0.0` |
//! | `ALLOWED_ORIGINS` | `*` (comma separated) |
//! | `LOG_FORMAT` | `text` (`json` for structured logs) |
//! | `CODEFORGE_CONFIG` | unset; path to an engine config JSON file |

use std::path::PathBuf;

use anyhow::{Context, Result};

use codeforge_core::config::{validate_config, EngineConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
    pub log_json: bool,
    pub engine: EngineConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("/data/codeforge.db"),
            host: "0.0.0.0".to_string(),
            port: 5001,
            allowed_origins: vec!["*".to_string()],
            log_json: false,
            engine: EngineConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(p) = get("DATABASE_PATH").filter(|s| !s.trim().is_empty()) {
            cfg.database_path = PathBuf::from(p);
        }
        if let Some(h) = get("HOST").filter(|s| !s.trim().is_empty()) {
            cfg.host = h;
        }
        if let Some(p) = get("PORT") {
            cfg.port = p
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got {p:?}"))?;
        }
        if let Some(origins) = get("ALLOWED_ORIGINS") {
            let list: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !list.is_empty() {
                cfg.allowed_origins = list;
            }
        }
        if let Some(f) = get("LOG_FORMAT") {
            cfg.log_json = f.eq_ignore_ascii_case("json");
        }
        if let Some(path) = get("CODEFORGE_CONFIG") {
            let bytes = std::fs::read(&path).with_context(|| format!("read engine config {path}"))?;
            cfg.engine = serde_json::from_slice(&bytes).with_context(|| format!("parse engine config {path}"))?;
        }
        validate_config(&cfg.engine)?;
        Ok(cfg)
    }

    pub fn any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
