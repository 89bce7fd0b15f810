//! codeforge-api
//!
//! HTTP storage service backing remote `kv` data sources, plus a server-side
//! page render endpoint built on `codeforge-components`.
//!
//! Routes:
//! - `GET  /health`
//! - `GET  /api/storage/keys`
//! - `GET|PUT|POST|DELETE /api/storage/{key}`
//! - `POST /api/storage/clear`, `GET /api/storage/export`, `POST /api/storage/import`
//! - `GET  /api/storage/stats`
//! - `GET  /api/components`, `POST /api/validate`, `POST /api/render`

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
mod routes;
pub mod state;

pub use crate::config::ApiConfig;
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::AppState;

/// Full service: routes, CORS, request ids and request tracing.
pub fn build_router(state: AppState, cfg: &ApiConfig) -> Router {
    routes::router()
        .layer(cors_layer(cfg))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

fn cors_layer(cfg: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .expose_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-total-count"),
        ])
        .max_age(Duration::from_secs(3600));
    if cfg.any_origin() {
        return layer.allow_origin(Any).allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer
        .allow_origin(origins)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
        .allow_credentials(true)
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

/// Resolves on SIGTERM or SIGINT (Ctrl-C elsewhere).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut term), Ok(mut int)) => {
                tokio::select! {
                    _ = term.recv() => {}
                    _ = int.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("shutdown signal received");
}
