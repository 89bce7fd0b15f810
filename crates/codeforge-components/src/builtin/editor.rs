//! `CodeEditor`: the one heavyweight built-in, registered lazily so pages that
//! never use it do not pay for its language table.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use super::text;
use crate::component::{Component, Props, View, ViewContext};
use crate::registry::ComponentRegistry;
use crate::spec::{ComponentSpec, PropKind};

pub fn register(reg: &mut ComponentRegistry) -> Result<()> {
    reg.register_lazy(
        ComponentSpec::new("CodeEditor", "input")
            .describe("Source editor with a language label")
            .prop("value", PropKind::String)
            .prop("language", PropKind::String)
            .prop("readOnly", PropKind::Boolean)
            .event("onChange")
            .meta("loading", "lazy"),
        || Ok(Arc::new(CodeEditor::load()) as Arc<dyn Component>),
    )
}

pub struct CodeEditor {
    /// language id → display name
    languages: BTreeMap<&'static str, &'static str>,
}

impl CodeEditor {
    fn load() -> Self {
        tracing::debug!("code editor loaded");
        let languages = [
            ("typescript", "TypeScript"),
            ("javascript", "JavaScript"),
            ("json", "JSON"),
            ("rust", "Rust"),
            ("python", "Python"),
            ("css", "CSS"),
            ("html", "HTML"),
            ("sql", "SQL"),
        ]
        .into_iter()
        .collect();
        Self { languages }
    }
}

impl Component for CodeEditor {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let lang = text(props, "language").unwrap_or_else(|| "plaintext".to_string());
        let label = self.languages.get(lang.as_str()).copied().unwrap_or("Plain text");
        let code = View::new("code")
            .class(format!("language-{lang}"))
            .text(text(props, "value").unwrap_or_default());
        Ok(View::new("div")
            .class("code-editor")
            .attr("data-language", lang.clone())
            .flag("data-readonly", super::flag(props, "readOnly"))
            .child(View::new("header").text(label))
            .child(View::new("pre").child(code)))
    }
}
