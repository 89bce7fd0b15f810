//! Component contract.
//!
//! A component turns resolved props into a [`View`]: a small element tree with
//! an optional [`ViewNode::Slot`] marking where rendered children go. Components
//! are pure; they never see the data context or the registry.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resolved props. Props that resolved to `undefined` are absent.
pub type Props = BTreeMap<String, Value>;

/// What a component may know about the node it renders.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    /// Node id, also the element key.
    pub key: &'a str,
    /// Names of the events wired on this node, in declaration order.
    pub events: &'a [String],
    pub child_count: usize,
}

pub trait Component: Send + Sync {
    fn view(&self, props: &Props, ctx: &ViewContext<'_>) -> Result<View>;
}

impl<F> Component for F
where
    F: Fn(&Props, &ViewContext<'_>) -> Result<View> + Send + Sync,
{
    fn view(&self, props: &Props, ctx: &ViewContext<'_>) -> Result<View> {
        self(props, ctx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ViewNode {
    Element(View),
    Text { text: String },
    /// Where the node's rendered children are placed.
    Slot,
}

/// One element of a component's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ViewNode>,
}

impl View {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            content: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set a boolean attribute when `on` holds.
    pub fn flag(self, name: &str, on: bool) -> Self {
        if on {
            self.attr(name, "")
        } else {
            self
        }
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.content.push(ViewNode::Text { text: text.into() });
        self
    }

    pub fn child(mut self, view: View) -> Self {
        self.content.push(ViewNode::Element(view));
        self
    }

    pub fn children<I: IntoIterator<Item = View>>(mut self, views: I) -> Self {
        self.content.extend(views.into_iter().map(ViewNode::Element));
        self
    }

    pub fn slot(mut self) -> Self {
        self.content.push(ViewNode::Slot);
        self
    }

    pub fn has_slot(&self) -> bool {
        self.content.iter().any(|n| match n {
            ViewNode::Slot => true,
            ViewNode::Element(v) => v.has_slot(),
            ViewNode::Text { .. } => false,
        })
    }

    /// Concatenated text content, depth first.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(view: &View, out: &mut String) {
    for n in &view.content {
        match n {
            ViewNode::Text { text } => out.push_str(text),
            ViewNode::Element(v) => collect_text(v, out),
            ViewNode::Slot => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_components() {
        let c = |props: &Props, _ctx: &ViewContext<'_>| -> Result<View> {
            Ok(View::new("p").text(props.len().to_string()))
        };
        let ctx = ViewContext {
            key: "n",
            events: &[],
            child_count: 0,
        };
        let v = c.view(&Props::new(), &ctx).unwrap();
        assert_eq!(v.text_content(), "0");
    }

    #[test]
    fn slot_is_found_in_nested_elements() {
        let v = View::new("section").child(View::new("div").slot());
        assert!(v.has_slot());
        assert!(!View::new("span").text("x").has_slot());
    }
}
