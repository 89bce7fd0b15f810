//! Read-only display components.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use codeforge_core::expr::eval::to_js_string;

use super::{item_label, items, number, text};
use crate::component::{Component, Props, View, ViewContext};
use crate::registry::ComponentRegistry;
use crate::spec::{ComponentSpec, PropKind};

pub fn register(reg: &mut ComponentRegistry) -> Result<()> {
    reg.register(
        ComponentSpec::new("Text", "display")
            .describe("Inline text")
            .prop("text", PropKind::Any)
            .prop("variant", PropKind::String),
        Arc::new(Text),
    )?;
    reg.register(
        ComponentSpec::new("Heading", "display")
            .required("text", PropKind::Any)
            .prop("level", PropKind::Number),
        Arc::new(Heading),
    )?;
    reg.register(
        ComponentSpec::new("Badge", "display")
            .prop("text", PropKind::Any)
            .prop("variant", PropKind::String),
        Arc::new(Badge),
    )?;
    reg.register(
        ComponentSpec::new("DataCard", "display")
            .describe("Headline metric with a title")
            .prop("title", PropKind::Any)
            .prop("value", PropKind::Any)
            .prop("description", PropKind::Any),
        Arc::new(DataCard),
    )?;
    reg.register(
        ComponentSpec::new("List", "display")
            .prop("items", PropKind::Array)
            .prop("emptyMessage", PropKind::String)
            .event("onItemClick"),
        Arc::new(List),
    )?;
    reg.register(
        ComponentSpec::new("Table", "display")
            .prop("rows", PropKind::Array)
            .prop("columns", PropKind::Array),
        Arc::new(Table),
    )?;
    Ok(())
}

pub struct Text;

impl Component for Text {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let mut v = View::new("span").text(text(props, "text").unwrap_or_default());
        if let Some(variant) = text(props, "variant") {
            v = v.class(format!("text-{variant}"));
        }
        Ok(v)
    }
}

pub struct Heading;

impl Component for Heading {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let level = number(props, "level").unwrap_or(2.0).clamp(1.0, 6.0) as u8;
        Ok(View::new(format!("h{level}")).text(text(props, "text").unwrap_or_default()))
    }
}

pub struct Badge;

impl Component for Badge {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let variant = text(props, "variant").unwrap_or_else(|| "default".to_string());
        Ok(View::new("span")
            .class(format!("badge badge-{variant}"))
            .text(text(props, "text").unwrap_or_default()))
    }
}

pub struct DataCard;

impl Component for DataCard {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let mut card = View::new("div").class("data-card");
        if let Some(title) = text(props, "title") {
            card = card.child(View::new("h3").text(title));
        }
        card = card.child(View::new("strong").text(text(props, "value").unwrap_or_default()));
        if let Some(d) = text(props, "description") {
            card = card.child(View::new("p").text(d));
        }
        Ok(card)
    }
}

pub struct List;

impl Component for List {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let rows = items(props, "items");
        if rows.is_empty() {
            let msg = text(props, "emptyMessage").unwrap_or_else(|| "No items".to_string());
            return Ok(View::new("p").class("list-empty").text(msg));
        }
        Ok(View::new("ul").children(rows.iter().map(|item| {
            let mut li = View::new("li");
            if let Some(id) = item.get("id") {
                li = li.attr("data-id", to_js_string(&Some(id.clone())));
            }
            if item.get("completed").and_then(Value::as_bool) == Some(true) {
                li = li.class("completed");
            }
            li.text(item_label(item))
        })))
    }
}

pub struct Table;

impl Component for Table {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let rows = items(props, "rows");
        let columns: Vec<String> = match props.get("columns") {
            Some(Value::Array(cols)) => cols.iter().map(item_label).collect(),
            _ => rows
                .first()
                .and_then(Value::as_object)
                .map(|o| o.keys().cloned().collect())
                .unwrap_or_default(),
        };

        let head = View::new("thead").child(
            View::new("tr").children(columns.iter().map(|c| View::new("th").text(c.clone()))),
        );
        let body = View::new("tbody").children(rows.iter().map(|row| {
            View::new("tr").children(columns.iter().map(|c| {
                let cell = row.get(c).map(|v| to_js_string(&Some(v.clone())));
                View::new("td").text(cell.unwrap_or_default())
            }))
        }));
        Ok(View::new("table").child(head).child(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ViewContext<'static> {
        ViewContext {
            key: "n",
            events: &[],
            child_count: 0,
        }
    }

    fn props(v: Value) -> Props {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn heading_level_is_clamped() {
        let v = Heading.view(&props(json!({"text": "Hi", "level": 9})), &ctx()).unwrap();
        assert_eq!(v.tag, "h6");
        let v = Heading.view(&props(json!({"text": "Hi"})), &ctx()).unwrap();
        assert_eq!(v.tag, "h2");
    }

    #[test]
    fn list_renders_items_or_empty_message() {
        let v = List
            .view(
                &props(json!({"items": [{"id": 1, "title": "Milk", "completed": true}, "Eggs"]})),
                &ctx(),
            )
            .unwrap();
        assert_eq!(v.tag, "ul");
        assert_eq!(v.text_content(), "MilkEggs");

        let v = List.view(&props(json!({})), &ctx()).unwrap();
        assert_eq!(v.text_content(), "No items");
    }

    #[test]
    fn table_derives_columns_from_first_row() {
        let v = Table
            .view(&props(json!({"rows": [{"a": 1, "b": "x"}, {"a": 2}]})), &ctx())
            .unwrap();
        assert_eq!(v.text_content(), "ab1x2");
    }

    #[test]
    fn data_card_shows_value() {
        let v = DataCard
            .view(&props(json!({"title": "Total", "value": 3})), &ctx())
            .unwrap();
        assert_eq!(v.text_content(), "Total3");
    }
}
