use std::sync::Arc;

use anyhow::Context;

use codeforge_api::{build_router, init_tracing, shutdown_signal, ApiConfig, AppState};
use codeforge_components::ComponentRegistry;
use codeforge_store::sqlite::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ApiConfig::from_env()?;
    init_tracing(cfg.log_json);

    let store = SqliteStore::open(&cfg.database_path)
        .with_context(|| format!("open database {}", cfg.database_path.display()))?;
    let components = ComponentRegistry::builtin()?;
    let state = AppState::new(Arc::new(store), Arc::new(components), cfg.engine.clone());
    let app = build_router(state, &cfg);

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(
        %addr,
        database = %cfg.database_path.display(),
        origins = ?cfg.allowed_origins,
        "codeforge-api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    tracing::info!("codeforge-api stopped");
    Ok(())
}
