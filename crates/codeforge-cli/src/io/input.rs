use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use url::Url;

use codeforge_core::config::EngineConfig;
use codeforge_core::model::PageSchema;

/// Raw bytes from `-` (stdin), an http(s) URL, or a local file.
pub async fn resolve_bytes(input: &str) -> Result<Vec<u8>> {
    if input == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("read stdin")?;
        return Ok(buf);
    }
    if looks_like_url(input) {
        return fetch_url(input).await;
    }
    fs::read(input).with_context(|| format!("read {input}"))
}

pub async fn read_schema(input: &str, cfg: &EngineConfig) -> Result<PageSchema> {
    let bytes = resolve_bytes(input).await?;
    PageSchema::from_slice(&bytes, cfg.limits.max_schema_bytes).map_err(|e| anyhow!("{input}: {e}"))
}

pub async fn read_json(input: &str) -> Result<Value> {
    let bytes = resolve_bytes(input).await?;
    serde_json::from_slice(&bytes).map_err(|e| anyhow!("invalid json in {input}: {e}"))
}

pub fn read_engine_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let raw = fs::read(path.as_ref()).with_context(|| format!("read config {}", path.as_ref().display()))?;
    serde_json::from_slice(&raw).map_err(|e| anyhow!("invalid engine config: {e}"))
}

/// JSON if it parses, otherwise the text as a string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let resp = reqwest::get(url).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow!("http error: {status}"));
    }
    Ok(resp.bytes().await?.to_vec())
}

fn looks_like_url(s: &str) -> bool {
    Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_http_urls_are_fetched() {
        assert!(looks_like_url("https://example.com/page.json"));
        assert!(!looks_like_url("pages/page.json"));
        assert!(!looks_like_url("C:/pages/page.json"));
    }

    #[test]
    fn values_fall_back_to_strings() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value(r#"{"a":true}"#), json!({"a": true}));
        assert_eq!(parse_value("dark"), json!("dark"));
    }

    #[tokio::test]
    async fn oversized_schema_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        fs::write(&path, json!({"id": "p", "components": []}).to_string()).unwrap();
        let mut cfg = EngineConfig::default();
        assert_eq!(read_schema(path.to_str().unwrap(), &cfg).await.unwrap().id, "p");
        cfg.limits.max_schema_bytes = 4;
        assert!(read_schema(path.to_str().unwrap(), &cfg).await.is_err());
    }
}
