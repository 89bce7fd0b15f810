//! HTML serialization of a rendered tree.
//!
//! Every element's outermost tag carries `data-key`; wired events are listed in
//! `data-events`. Children go where the component put its slot, or right
//! after the component's element when it has none.

use std::fmt::Write as _;

use serde_json::Value;

use codeforge_core::config::RenderConfig;

use crate::component::{View, ViewNode};
use crate::render::RenderedElement;

const VOID: &[&str] = &["input", "br", "hr", "img", "meta", "link"];

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Serialize a forest of rendered elements.
pub fn to_html(tree: &[RenderedElement], cfg: &RenderConfig) -> String {
    let mut out = String::new();
    for el in tree {
        element(el, cfg, &mut out);
    }
    out
}

fn element(el: &RenderedElement, cfg: &RenderConfig, out: &mut String) {
    let extra = marker_attrs(el, cfg);
    match (&el.view, &el.placeholder) {
        (Some(view), None) => {
            let mut children = String::new();
            for c in &el.children {
                element(c, cfg, &mut children);
            }
            let mut placed = false;
            view_html(view, &extra, &children, &mut placed, out);
            if !placed {
                out.push_str(&children);
            }
        }
        (_, placeholder) => {
            let message = placeholder
                .as_ref()
                .map(|p| p.describe(&el.type_name))
                .unwrap_or_default();
            let _ = write!(
                out,
                "<div class=\"cf-placeholder\"{extra} role=\"alert\">{}</div>",
                escape(&message)
            );
            for c in &el.children {
                element(c, cfg, out);
            }
        }
    }
}

fn marker_attrs(el: &RenderedElement, cfg: &RenderConfig) -> String {
    let mut s = format!(" data-key=\"{}\"", escape(&el.key));
    if !el.events.is_empty() {
        let _ = write!(s, " data-events=\"{}\"", escape(&el.events.join(" ")));
    }
    if cfg.debug_attributes {
        let _ = write!(s, " data-type=\"{}\"", escape(&el.type_name));
        for (name, v) in &el.props {
            let text = match v {
                Value::String(t) => t.clone(),
                other => other.to_string(),
            };
            let _ = write!(s, " data-prop-{}=\"{}\"", attr_name(name), escape(&text));
        }
    }
    s
}

fn attr_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        }
    }
    out
}

fn view_html(view: &View, extra: &str, children: &str, placed: &mut bool, out: &mut String) {
    let _ = write!(out, "<{}", view.tag);
    for (k, v) in &view.attrs {
        if v.is_empty() {
            let _ = write!(out, " {k}");
        } else {
            let _ = write!(out, " {k}=\"{}\"", escape(v));
        }
    }
    out.push_str(extra);
    out.push('>');
    if VOID.contains(&view.tag.as_str()) {
        return;
    }
    for node in &view.content {
        match node {
            ViewNode::Text { text } => out.push_str(&escape(text)),
            ViewNode::Element(v) => view_html(v, "", children, placed, out),
            ViewNode::Slot if !*placed => {
                out.push_str(children);
                *placed = true;
            }
            ViewNode::Slot => {}
        }
    }
    let _ = write!(out, "</{}>", view.tag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Placeholder;
    use serde_json::json;

    fn leaf(key: &str, view: View) -> RenderedElement {
        RenderedElement {
            key: key.to_string(),
            type_name: "Text".to_string(),
            props: Default::default(),
            events: Vec::new(),
            view: Some(view),
            placeholder: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn escapes_text_and_attributes() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        let el = leaf("t", View::new("span").text("<b>"));
        assert_eq!(
            to_html(&[el], &RenderConfig::default()),
            "<span data-key=\"t\">&lt;b&gt;</span>"
        );
    }

    #[test]
    fn children_fill_the_slot() {
        let mut parent = leaf("s", View::new("section").child(View::new("div").slot()).text("end"));
        parent.children.push(leaf("c", View::new("p").text("x")));
        assert_eq!(
            to_html(&[parent], &RenderConfig::default()),
            "<section data-key=\"s\"><div><p data-key=\"c\">x</p></div>end</section>"
        );
    }

    #[test]
    fn children_without_slot_are_appended() {
        let mut parent = leaf("b", View::new("button").attr("type", "button").text("Go"));
        parent.children.push(leaf("c", View::new("span")));
        assert_eq!(
            to_html(&[parent], &RenderConfig::default()),
            "<button type=\"button\" data-key=\"b\">Go</button><span data-key=\"c\"></span>"
        );
    }

    #[test]
    fn placeholder_and_debug_attributes() {
        let el = RenderedElement {
            key: "w".to_string(),
            type_name: "NonexistentWidget".to_string(),
            props: [("maxItems".to_string(), json!(3))].into_iter().collect(),
            events: vec!["onClick".to_string()],
            view: None,
            placeholder: Some(Placeholder::UnknownType),
            children: Vec::new(),
        };
        let cfg = RenderConfig {
            show_placeholders: true,
            debug_attributes: true,
        };
        assert_eq!(
            to_html(&[el], &cfg),
            "<div class=\"cf-placeholder\" data-key=\"w\" data-events=\"onClick\" data-type=\"NonexistentWidget\" data-prop-max-items=\"3\" role=\"alert\">Unknown component: NonexistentWidget</div>"
        );
    }
}
