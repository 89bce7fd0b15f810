use std::sync::Arc;

use anyhow::{anyhow, Result};
use thiserror::Error;

use codeforge_components::{ComponentRegistry, Page, PageEnv, PageError};
use codeforge_core::action::{EffectLog, Effects};
use codeforge_core::config::{validate_config, EngineConfig};
use codeforge_core::model::PageSchema;
use codeforge_store::{StoreAdmin, StoreLocation};

use crate::args::{Backend, Cli, Command};
use crate::io::input;

mod components;
mod fire;
mod render;
mod storage;
mod validate;

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub location: StoreLocation,
    pub engine: EngineConfig,
}

impl Ctx {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let location = match cli.backend {
            Backend::Sqlite => StoreLocation::Sqlite(cli.store_root.join("codeforge.db")),
            Backend::Fs => StoreLocation::Fs(cli.store_root.join("kv")),
            Backend::Memory => StoreLocation::Memory,
            Backend::Remote => StoreLocation::Remote(
                cli.remote_url
                    .clone()
                    .ok_or_else(|| anyhow!("--backend remote needs --remote-url"))?,
            ),
        };
        let engine = match &cli.config {
            Some(path) => input::read_engine_config(path)?,
            None => EngineConfig::default(),
        };
        validate_config(&engine)?;
        tracing::debug!(?location, "cli context");
        Ok(Self { location, engine })
    }

    pub fn open_store(&self) -> Result<Arc<dyn StoreAdmin>> {
        Ok(self.location.open()?)
    }

    /// Mount `schema` against the selected store; effects go to `log`.
    pub async fn mount(&self, schema: &PageSchema, log: Arc<EffectLog>) -> Result<Page, MountError> {
        let store = self.open_store().map_err(MountError::Setup)?;
        let components = Arc::new(ComponentRegistry::builtin().map_err(MountError::Setup)?);
        let env = PageEnv::new(self.engine.clone(), Effects::logged(log));
        Page::mount(schema, components, store.into_kv(), env)
            .await
            .map_err(MountError::Page)
    }
}

/// Mount failures: either the environment or the page itself.
#[derive(Debug, Error)]
pub enum MountError {
    #[error(transparent)]
    Setup(anyhow::Error),
    #[error(transparent)]
    Page(PageError),
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let ctx = Ctx::from_cli(&cli)?;
    match cli.command {
        Command::Validate { input } => validate::run(&ctx, &input).await,
        Command::Render { input, format } => render::run(&ctx, &input, format).await,
        Command::Fire {
            input,
            node,
            event,
            payload,
            times,
        } => fire::run(&ctx, &input, &node, &event, payload.as_deref(), times).await,
        Command::Components => components::run().await,
        Command::Storage { command } => storage::run(&ctx, command).await,
    }
}
