use anyhow::Result;
use serde_json::json;

use codeforge_core::action::EffectLog;

use crate::args::RenderFormat;
use crate::cmd::validate::print_diagnostics;
use crate::cmd::{Ctx, MountError};
use crate::io::input;
use crate::output;

pub async fn run(ctx: &Ctx, input_arg: &str, format: RenderFormat) -> Result<()> {
    let schema = input::read_schema(input_arg, &ctx.engine).await?;
    let page = match ctx.mount(&schema, EffectLog::new()).await {
        Ok(page) => page,
        Err(MountError::Page(err)) => {
            if output::is_json() {
                output::print(&json!({
                    "error": err.to_string(),
                    "diagnostics": err.diagnostics(),
                }))?;
            } else {
                print_diagnostics(err.diagnostics())?;
            }
            return Err(err.into());
        }
        Err(other) => return Err(other.into()),
    };

    match (format, output::is_json()) {
        (RenderFormat::Html, false) => println!("{}", page.to_html()),
        (RenderFormat::Html, true) => output::print(&json!({ "page": page.id(), "html": page.to_html() }))?,
        (RenderFormat::Json, _) => output::print(&json!({
            "page": page.id(),
            "tree": page.tree(),
            "diagnostics": page.diagnostics(),
            "data": page.data().to_json(),
        }))?,
    }
    page.flush().await;
    Ok(())
}
