use anyhow::Result;
use serde::Serialize;
use termcolor::Color;

use codeforge_components::ComponentRegistry;

use crate::output;

#[derive(Debug, Serialize)]
pub struct ComponentInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub category: String,
    pub description: String,
    pub props: Vec<String>,
    pub events: Vec<String>,
    pub accepts_children: bool,
    pub lazy: bool,
}

#[derive(Debug, Serialize)]
pub struct ComponentsOut {
    pub components: Vec<ComponentInfo>,
}

pub fn list(reg: &ComponentRegistry) -> ComponentsOut {
    let components = reg
        .specs()
        .map(|s| ComponentInfo {
            type_name: s.type_name.clone(),
            category: s.category.clone(),
            description: s.description.clone(),
            props: s
                .props
                .iter()
                .map(|p| if p.required { format!("{}*", p.name) } else { p.name.clone() })
                .collect(),
            events: s.events.clone(),
            accepts_children: s.accepts_children,
            lazy: s.meta.get("loading").map(String::as_str) == Some("lazy"),
        })
        .collect();
    ComponentsOut { components }
}

pub async fn run() -> Result<()> {
    let reg = ComponentRegistry::builtin()?;
    let out = list(&reg);
    if output::is_json() {
        return output::print(&out);
    }
    for c in &out.components {
        let mut line = format!("{} [{}]", c.type_name, c.props.join(", "));
        if !c.events.is_empty() {
            line.push_str(&format!(" on {}", c.events.join(", ")));
        }
        if c.lazy {
            line.push_str(" (lazy)");
        }
        output::status(&c.category, Color::Blue, &line)?;
    }
    Ok(())
}
