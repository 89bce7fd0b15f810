use anyhow::{bail, Result};
use serde::Serialize;
use termcolor::Color;

use codeforge_core::config::EngineConfig;
use codeforge_core::diagnostics::{Diagnostic, DiagnosticLevel};
use codeforge_core::model::{validate_page, PageSchema};

use crate::cmd::Ctx;
use crate::io::input;
use crate::output;

#[derive(Debug, Serialize)]
pub struct ValidateOut {
    pub page: String,
    pub ok: bool,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn check(schema: &PageSchema, cfg: &EngineConfig) -> ValidateOut {
    let report = validate_page(schema, cfg);
    ValidateOut {
        page: schema.id.clone(),
        ok: report.ok,
        errors: report.errors().count(),
        warnings: report.warnings().count(),
        diagnostics: report.diagnostics,
    }
}

pub fn print_diagnostics(diags: &[Diagnostic]) -> Result<()> {
    for d in diags {
        let color = match d.level {
            DiagnosticLevel::Error => Color::Red,
            DiagnosticLevel::Warning => Color::Yellow,
            DiagnosticLevel::Info => Color::Cyan,
        };
        let at = d.path.as_deref().map(|p| format!(" ({p})")).unwrap_or_default();
        output::status(d.level.as_str(), color, &format!("{}: {}{at}", d.code, d.message))?;
    }
    Ok(())
}

pub async fn run(ctx: &Ctx, input_arg: &str) -> Result<()> {
    let schema = input::read_schema(input_arg, &ctx.engine).await?;
    let out = check(&schema, &ctx.engine);

    if output::is_json() {
        output::print(&out)?;
    } else {
        print_diagnostics(&out.diagnostics)?;
        if out.ok {
            output::status(
                "ok",
                Color::Green,
                &format!("page {} is valid ({} warning(s))", out.page, out.warnings),
            )?;
        }
    }
    if !out.ok {
        bail!("page {} has {} error(s)", out.page, out.errors);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::testutil::schema;
    use serde_json::json;

    #[test]
    fn reports_errors_and_warnings() {
        let page = schema(json!({
            "id": "p",
            "dataSources": [{"id": "a", "type": "static", "defaultValue": 1}],
            "components": [
                {"id": "t", "type": "Text", "props": {"text": "{{missing}}"}},
                {"id": "l", "type": "List", "bindings": {"items": {"source": "nope"}}}
            ]
        }));
        let out = check(&page, &EngineConfig::default());
        assert!(!out.ok);
        assert!(out.errors >= 1);
        assert!(out.warnings >= 1);
        assert!(out.diagnostics[0].is_error());
    }

    #[test]
    fn clean_page_is_ok() {
        let page = schema(json!({
            "id": "p",
            "dataSources": [{"id": "a", "type": "static", "defaultValue": 1}],
            "components": [{"id": "t", "type": "Text", "props": {"text": "{{a}}"}}]
        }));
        let out = check(&page, &EngineConfig::default());
        assert!(out.ok);
        assert_eq!(out.errors, 0);
    }
}
