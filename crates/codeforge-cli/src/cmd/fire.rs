use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use codeforge_components::FireOutcome;
use codeforge_core::action::{EffectLog, Toast};
use codeforge_core::model::PageSchema;
use codeforge_core::persist::PersistStats;

use crate::cmd::Ctx;
use crate::io::input;
use crate::output;

#[derive(Debug, Serialize)]
pub struct FireOut {
    pub page: String,
    pub node: String,
    pub event: String,
    pub outcomes: Vec<FireOutcome>,
    pub data: BTreeMap<String, Value>,
    pub toasts: Vec<Toast>,
    pub navigations: Vec<String>,
    pub persist: Option<PersistStats>,
}

/// Mount, fire `times` times, then wait for persistence before reporting.
pub async fn fire_page(
    ctx: &Ctx,
    schema: &PageSchema,
    node: &str,
    event: &str,
    payload: Option<Value>,
    times: u32,
) -> Result<FireOut> {
    if times == 0 {
        bail!("--times must be at least 1");
    }
    let log = EffectLog::new();
    let mut page = ctx.mount(schema, log.clone()).await?;

    let mut outcomes = Vec::with_capacity(times as usize);
    for _ in 0..times {
        outcomes.push(page.fire(node, event, payload.clone())?);
    }
    page.flush().await;

    let out = FireOut {
        page: page.id().to_string(),
        node: node.to_string(),
        event: event.to_string(),
        outcomes,
        data: page.data().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        toasts: log.toasts(),
        navigations: log.navigations(),
        persist: page.persist_stats(),
    };
    page.unmount();
    Ok(out)
}

pub async fn run(
    ctx: &Ctx,
    input_arg: &str,
    node: &str,
    event: &str,
    payload: Option<&str>,
    times: u32,
) -> Result<()> {
    let schema = input::read_schema(input_arg, &ctx.engine).await?;
    let payload = payload.map(input::parse_value);
    let out = fire_page(ctx, &schema, node, event, payload, times).await?;
    if let Some(stats) = out.persist {
        if stats.failed > 0 {
            output::eprintln_line(&format!("warning: {} storage write(s) failed", stats.failed));
        }
    }
    output::print(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::testutil::{ctx, schema};
    use codeforge_core::storage::KvStorage;
    use codeforge_store::StoreLocation;
    use serde_json::json;

    fn todo_page() -> PageSchema {
        schema(json!({
            "id": "todos",
            "dataSources": [{"id": "todos", "type": "kv", "key": "app:todos", "defaultValue": []}],
            "components": [
                {"id": "add", "type": "Button", "props": {"label": "Add"},
                 "events": {"onClick": [
                    {"type": "create", "target": "todos", "valueFrom": "event"},
                    {"type": "show-toast", "message": "Added {{event.text}}"}
                 ]}}
            ]
        }))
    }

    #[tokio::test]
    async fn fires_repeatedly_and_records_effects() {
        let ctx = ctx(StoreLocation::Memory);
        let out = fire_page(&ctx, &todo_page(), "add", "onClick", Some(json!({"text": "Milk"})), 2)
            .await
            .unwrap();
        assert_eq!(out.outcomes.len(), 2);
        assert_eq!(out.data["todos"].as_array().unwrap().len(), 2);
        assert_eq!(out.toasts.len(), 2);
        assert_eq!(out.toasts[0].message, "Added Milk");
    }

    #[tokio::test]
    async fn kv_state_carries_across_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(StoreLocation::Sqlite(dir.path().join("codeforge.db")));
        for _ in 0..2 {
            let out = fire_page(&ctx, &todo_page(), "add", "onClick", Some(json!({"text": "Eggs"})), 1)
                .await
                .unwrap();
            assert_eq!(out.persist.unwrap().failed, 0);
        }
        let store = ctx.open_store().unwrap();
        let todos = store.get("app:todos").await.unwrap().unwrap();
        assert_eq!(todos.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_node_is_an_error() {
        let ctx = ctx(StoreLocation::Memory);
        let err = fire_page(&ctx, &todo_page(), "nope", "onClick", None, 1).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
