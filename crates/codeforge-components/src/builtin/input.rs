//! Interactive components. Events are wired by the page; these only describe
//! the element and advertise the event names they fire.

use std::sync::Arc;

use anyhow::Result;

use super::{flag, text};
use crate::component::{Component, Props, View, ViewContext};
use crate::registry::ComponentRegistry;
use crate::spec::{ComponentSpec, PropKind};

pub fn register(reg: &mut ComponentRegistry) -> Result<()> {
    reg.register(
        ComponentSpec::new("Button", "input")
            .prop("label", PropKind::Any)
            .prop("variant", PropKind::String)
            .prop("disabled", PropKind::Boolean)
            .event("onClick"),
        Arc::new(Button),
    )?;
    reg.register(
        ComponentSpec::new("Input", "input")
            .prop("value", PropKind::Any)
            .prop("placeholder", PropKind::String)
            .prop("inputType", PropKind::String)
            .prop("disabled", PropKind::Boolean)
            .event("onChange")
            .event("onSubmit"),
        Arc::new(Input),
    )?;
    reg.register(
        ComponentSpec::new("Checkbox", "input")
            .prop("checked", PropKind::Boolean)
            .prop("label", PropKind::Any)
            .event("onChange"),
        Arc::new(Checkbox),
    )?;
    Ok(())
}

pub struct Button;

impl Component for Button {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let variant = text(props, "variant").unwrap_or_else(|| "primary".to_string());
        Ok(View::new("button")
            .attr("type", "button")
            .class(format!("btn btn-{variant}"))
            .flag("disabled", flag(props, "disabled"))
            .text(text(props, "label").unwrap_or_default()))
    }
}

pub struct Input;

impl Component for Input {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let mut v = View::new("input")
            .attr("type", text(props, "inputType").unwrap_or_else(|| "text".to_string()))
            .attr("value", text(props, "value").unwrap_or_default())
            .flag("disabled", flag(props, "disabled"));
        if let Some(p) = text(props, "placeholder") {
            v = v.attr("placeholder", p);
        }
        Ok(v)
    }
}

pub struct Checkbox;

impl Component for Checkbox {
    fn view(&self, props: &Props, _ctx: &ViewContext<'_>) -> Result<View> {
        let input = View::new("input")
            .attr("type", "checkbox")
            .flag("checked", flag(props, "checked"));
        let mut label = View::new("label").child(input);
        if let Some(t) = text(props, "label") {
            label = label.text(t);
        }
        Ok(label)
    }
}
