//! Containers. Each one places its rendered children at a slot.

use std::sync::Arc;

use anyhow::Result;

use super::{flag, number, text};
use crate::component::{Component, Props, View, ViewContext};
use crate::registry::ComponentRegistry;
use crate::spec::{ComponentSpec, PropKind};

pub fn register(reg: &mut ComponentRegistry) -> Result<()> {
    reg.register(
        ComponentSpec::new("Stack", "layout")
            .prop("direction", PropKind::String)
            .prop("gap", PropKind::Number)
            .children(),
        Arc::new(Stack),
    )?;
    reg.register(
        ComponentSpec::new("Grid", "layout")
            .prop("columns", PropKind::Number)
            .children(),
        Arc::new(Grid),
    )?;
    reg.register(
        ComponentSpec::new("Card", "layout")
            .prop("title", PropKind::Any)
            .prop("description", PropKind::Any)
            .children(),
        Arc::new(Card),
    )?;
    reg.register(
        ComponentSpec::new("Dialog", "layout")
            .describe("Modal container shown while `open` is truthy")
            .prop("open", PropKind::Any)
            .prop("title", PropKind::Any)
            .event("onClose")
            .children(),
        Arc::new(Dialog),
    )?;
    Ok(())
}

pub struct Stack;

impl Component for Stack {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let direction = match text(props, "direction").as_deref() {
            Some("horizontal" | "row") => "row",
            _ => "column",
        };
        let gap = number(props, "gap").unwrap_or(8.0);
        Ok(View::new("div")
            .class(format!("stack stack-{direction}"))
            .attr("style", format!("display:flex;flex-direction:{direction};gap:{gap}px"))
            .slot())
    }
}

pub struct Grid;

impl Component for Grid {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let cols = number(props, "columns").unwrap_or(2.0).max(1.0) as u32;
        Ok(View::new("div")
            .class("grid")
            .attr(
                "style",
                format!("display:grid;grid-template-columns:repeat({cols},1fr)"),
            )
            .slot())
    }
}

pub struct Card;

impl Component for Card {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let mut card = View::new("section").class("card");
        if let Some(title) = text(props, "title") {
            card = card.child(View::new("h2").text(title));
        }
        if let Some(d) = text(props, "description") {
            card = card.child(View::new("p").text(d));
        }
        Ok(card.child(View::new("div").class("card-body").slot()))
    }
}

pub struct Dialog;

impl Component for Dialog {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let open = flag(props, "open");
        let mut dialog = View::new("dialog").flag("open", open);
        if let Some(title) = text(props, "title") {
            dialog = dialog.child(View::new("h2").text(title));
        }
        Ok(dialog.slot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dialog_open_attribute_tracks_prop() {
        let ctx = ViewContext {
            key: "d",
            events: &[],
            child_count: 1,
        };
        let open: Props = serde_json::from_value(json!({"open": true, "title": "Edit"})).unwrap();
        let closed: Props = serde_json::from_value(json!({"open": false})).unwrap();
        assert!(Dialog.view(&open, &ctx).unwrap().attrs.contains_key("open"));
        assert!(!Dialog.view(&closed, &ctx).unwrap().attrs.contains_key("open"));
    }

    #[test]
    fn containers_expose_a_slot() {
        let ctx = ViewContext {
            key: "s",
            events: &[],
            child_count: 2,
        };
        let containers: [&dyn Component; 4] = [&Stack, &Grid, &Card, &Dialog];
        for c in containers {
            assert!(c.view(&Props::new(), &ctx).unwrap().has_slot());
        }
    }
}
