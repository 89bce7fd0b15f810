//! HTTP routes.
//!
//! Storage routes mirror the browser-side `kv` contract: every value is an
//! arbitrary JSON document addressed by a string key.

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

mod health;
mod pages;
mod storage;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/components", get(pages::components))
        .route("/api/validate", post(pages::validate))
        .route("/api/render", post(pages::render))
        .route("/api/storage/keys", get(storage::keys))
        .route("/api/storage/clear", post(storage::clear))
        .route("/api/storage/export", get(storage::export))
        .route("/api/storage/import", post(storage::import))
        .route("/api/storage/stats", get(storage::stats))
        .route(
            "/api/storage/{key}",
            get(storage::get_value)
                .put(storage::put_value)
                .post(storage::put_value)
                .delete(storage::delete_value),
        )
}
