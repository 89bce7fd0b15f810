//! Client for the CodeForge storage service (`codeforge-api`).
//!
//! Keys are sent as a single URL path segment, so `/` and other reserved
//! characters in keys are percent-encoded rather than splitting the path.

#![cfg(feature = "http")]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use codeforge_core::storage::KvStorage;
use codeforge_core::ForgeResult;

use crate::admin::{StoreAdmin, StoreStats};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base: Url,
}

#[derive(Deserialize)]
struct KeysBody {
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct ValueBody {
    value: Value,
}

#[derive(Deserialize)]
struct ImportBody {
    imported: usize,
}

#[derive(Deserialize)]
struct StatsBody {
    total_keys: u64,
    total_size_bytes: u64,
    #[serde(default)]
    database_path: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Http(format!("invalid base url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Http(format!("not a base url: {base_url}")));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Http("not a base url".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(resp: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Http(format!("{status}: {body}")))
    }
}

#[async_trait]
impl KvStorage for RemoteStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str) -> ForgeResult<Option<Value>> {
        let url = self.url(&["api", "storage", key])?;
        let resp = self.client.get(url).send().await.map_err(StoreError::from)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ValueBody = Self::check(resp).await?.json().await.map_err(StoreError::from)?;
        Ok(Some(body.value))
    }

    async fn set(&self, key: &str, value: Value) -> ForgeResult<()> {
        let url = self.url(&["api", "storage", key])?;
        let resp = self
            .client
            .put(url)
            .json(&json!({ "value": value }))
            .send()
            .await
            .map_err(StoreError::from)?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> ForgeResult<()> {
        let url = self.url(&["api", "storage", key])?;
        let resp = self.client.delete(url).send().await.map_err(StoreError::from)?;
        if resp.status() != StatusCode::NOT_FOUND {
            Self::check(resp).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> ForgeResult<Vec<String>> {
        let url = self.url(&["api", "storage", "keys"])?;
        let resp = self.client.get(url).send().await.map_err(StoreError::from)?;
        let body: KeysBody = Self::check(resp).await?.json().await.map_err(StoreError::from)?;
        Ok(body.keys)
    }
}

#[async_trait]
impl StoreAdmin for RemoteStore {
    async fn clear(&self) -> ForgeResult<()> {
        let url = self.url(&["api", "storage", "clear"])?;
        let resp = self.client.post(url).send().await.map_err(StoreError::from)?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn export(&self) -> ForgeResult<BTreeMap<String, Value>> {
        let url = self.url(&["api", "storage", "export"])?;
        let resp = self.client.get(url).send().await.map_err(StoreError::from)?;
        Ok(Self::check(resp).await?.json().await.map_err(StoreError::from)?)
    }

    async fn import(&self, entries: BTreeMap<String, Value>) -> ForgeResult<usize> {
        let url = self.url(&["api", "storage", "import"])?;
        let resp = self
            .client
            .post(url)
            .json(&entries)
            .send()
            .await
            .map_err(StoreError::from)?;
        let body: ImportBody = Self::check(resp).await?.json().await.map_err(StoreError::from)?;
        Ok(body.imported)
    }

    async fn stats(&self) -> ForgeResult<StoreStats> {
        let url = self.url(&["api", "storage", "stats"])?;
        let resp = self.client.get(url).send().await.map_err(StoreError::from)?;
        let body: StatsBody = Self::check(resp).await?.json().await.map_err(StoreError::from)?;
        Ok(StoreStats {
            total_keys: body.total_keys,
            total_size_bytes: body.total_size_bytes,
            location: body.database_path.unwrap_or_else(|| self.base.to_string()),
        })
    }

    fn into_kv(self: Arc<Self>) -> Arc<dyn KvStorage> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_single_path_segments() {
        let store = RemoteStore::new("http://localhost:5001/").unwrap();
        let url = store.url(&["api", "storage", "app/settings"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5001/api/storage/app%2Fsettings");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(RemoteStore::new("mailto:someone@example.com").is_err());
        assert!(RemoteStore::new("not a url").is_err());
    }
}
