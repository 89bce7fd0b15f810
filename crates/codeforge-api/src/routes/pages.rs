use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use codeforge_components::{Page, PageEnv, PageError};
use codeforge_core::action::{EffectLog, Effects};
use codeforge_core::model::{validate_page, PageSchema};
use codeforge_core::storage::KvStorage;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct RenderRequest {
    schema: Value,
    /// Events fired in order after mount.
    #[serde(default)]
    events: Vec<EventRequest>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventRequest {
    node: String,
    event: String,
    #[serde(default)]
    payload: Option<Value>,
}

fn parse_schema(st: &AppState, schema: &Value) -> ApiResult<PageSchema> {
    let bytes = serde_json::to_vec(schema).map_err(|e| ApiError::Internal(e.to_string()))?;
    PageSchema::from_slice(&bytes, st.engine.limits.max_schema_bytes)
        .map_err(|e| ApiError::bad_request(format!("invalid page schema: {e}")))
}

pub(crate) async fn components(State(st): State<AppState>) -> Json<Value> {
    let specs: Vec<_> = st.components.specs().collect();
    Json(json!({ "components": specs }))
}

pub(crate) async fn validate(State(st): State<AppState>, Json(schema): Json<Value>) -> ApiResult<Json<Value>> {
    let schema = parse_schema(&st, &schema)?;
    let report = validate_page(&schema, &st.engine);
    Ok(Json(json!(report)))
}

/// Mount the page against the service store, replay any events, and return
/// the final tree. `kv` writes made by the events are persisted.
pub(crate) async fn render(State(st): State<AppState>, Json(req): Json<RenderRequest>) -> ApiResult<Response> {
    let schema = parse_schema(&st, &req.schema)?;
    let storage: Arc<dyn KvStorage> = st.store.clone().into_kv();
    let log = EffectLog::new();
    let env = PageEnv::new(st.engine.clone(), Effects::logged(log.clone()));

    let mut page = match Page::mount(&schema, st.components.clone(), storage, env).await {
        Ok(page) => page,
        Err(err @ PageError::Invalid(_)) => {
            tracing::info!(page = %schema.id, error = %err, "render rejected");
            let body = json!({
                "error": err.to_string(),
                "diagnostics": err.diagnostics(),
                "html": err.to_html(),
            });
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response());
        }
        Err(err) => return Err(ApiError::Internal(err.to_string())),
    };

    let mut outcomes = Vec::with_capacity(req.events.len());
    for ev in req.events {
        let outcome = page.fire(&ev.node, &ev.event, ev.payload).map_err(|e| match e {
            PageError::UnknownNode(_) | PageError::UnknownEvent { .. } => ApiError::bad_request(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        })?;
        outcomes.push(outcome);
    }
    page.flush().await;

    let body = json!({
        "page": page.id(),
        "layout": schema.layout,
        "html": page.to_html(),
        "tree": page.tree(),
        "diagnostics": page.diagnostics(),
        "data": page.data().to_json(),
        "events": outcomes,
        "effects": {
            "toasts": log.toasts(),
            "navigations": log.navigations(),
        },
        "persist": page.persist_stats(),
    });
    page.unmount();
    Ok(Json(body).into_response())
}
