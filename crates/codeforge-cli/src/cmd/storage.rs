use std::fs;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use codeforge_core::storage::KvStorage;
use codeforge_store::StoreAdmin;

use crate::args::StorageCommand;
use crate::cmd::Ctx;
use crate::io::input;
use crate::output;

/// Run one storage command and return what it prints.
pub async fn execute(store: &dyn StoreAdmin, command: StorageCommand) -> Result<Value> {
    let out = match command {
        StorageCommand::Keys => json!({ "keys": store.keys().await? }),
        StorageCommand::Get { key } => match store.get(&key).await? {
            Some(value) => json!({ "key": key, "value": value }),
            None => bail!("Key not found: {key}"),
        },
        StorageCommand::Set { key, value } => {
            store.set(&key, input::parse_value(&value)).await?;
            json!({ "success": true, "key": key })
        }
        StorageCommand::Delete { key } => {
            if store.get(&key).await?.is_none() {
                bail!("Key not found: {key}");
            }
            store.delete(&key).await?;
            json!({ "success": true, "key": key })
        }
        StorageCommand::Clear => {
            store.clear().await?;
            json!({ "success": true })
        }
        StorageCommand::Export { out } => {
            let data = serde_json::to_value(store.export().await?)?;
            match out {
                Some(path) => {
                    fs::write(&path, serde_json::to_vec_pretty(&data)?)
                        .with_context(|| format!("write {}", path.display()))?;
                    json!({ "success": true, "exported": data.as_object().map_or(0, |m| m.len()), "path": path })
                }
                None => data,
            }
        }
        StorageCommand::Import { input: src } => {
            let Value::Object(map) = input::read_json(&src).await? else {
                return Err(anyhow!("Data must be an object"));
            };
            let imported = store.import(map.into_iter().collect()).await?;
            json!({ "success": true, "imported": imported })
        }
        StorageCommand::Stats => serde_json::to_value(store.stats().await?)?,
    };
    Ok(out)
}

pub async fn run(ctx: &Ctx, command: StorageCommand) -> Result<()> {
    let store = ctx.open_store()?;
    let out = execute(store.as_ref(), command).await?;
    output::print(&out)
}
