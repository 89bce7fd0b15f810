use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use codeforge_core::storage::KvStorage;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub(crate) async fn keys(State(st): State<AppState>) -> ApiResult<Json<Value>> {
    let keys = st.store.keys().await?;
    Ok(Json(json!({ "keys": keys })))
}

pub(crate) async fn get_value(State(st): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Value>> {
    match st.store.get(&key).await? {
        Some(value) => Ok(Json(json!({ "value": value }))),
        None => Err(ApiError::not_found("Key not found")),
    }
}

/// PUT and POST both upsert `{"value": ...}`.
pub(crate) async fn put_value(
    State(st): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let value = match body {
        Value::Object(mut map) if map.contains_key("value") => map.remove("value").unwrap_or(Value::Null),
        _ => return Err(ApiError::bad_request("Missing value field")),
    };
    st.store.set(&key, value).await?;
    tracing::debug!(%key, "value stored");
    Ok(Json(json!({ "success": true })))
}

pub(crate) async fn delete_value(State(st): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Value>> {
    if st.store.get(&key).await?.is_none() {
        return Err(ApiError::not_found("Key not found"));
    }
    st.store.delete(&key).await?;
    Ok(Json(json!({ "success": true })))
}

pub(crate) async fn clear(State(st): State<AppState>) -> ApiResult<Json<Value>> {
    st.store.clear().await?;
    tracing::info!("storage cleared");
    Ok(Json(json!({ "success": true })))
}

pub(crate) async fn export(State(st): State<AppState>) -> ApiResult<Json<BTreeMap<String, Value>>> {
    Ok(Json(st.store.export().await?))
}

pub(crate) async fn import(State(st): State<AppState>, Json(body): Json<Value>) -> ApiResult<Json<Value>> {
    let Value::Object(map) = body else {
        return Err(ApiError::bad_request("Data must be an object"));
    };
    let imported = st.store.import(map.into_iter().collect()).await?;
    tracing::info!(imported, "storage import");
    Ok(Json(json!({ "success": true, "imported": imported })))
}

pub(crate) async fn stats(State(st): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = st.store.stats().await?;
    Ok(Json(json!({
        "total_keys": stats.total_keys,
        "total_size_bytes": stats.total_size_bytes,
        "database_path": stats.location,
    })))
}
