//! Built-in component set.
//!
//! Display: `Text`, `Heading`, `Badge`, `DataCard`, `List`, `Table`.
//! Input: `Button`, `Input`, `Checkbox`, `CodeEditor` (lazy).
//! Layout: `Stack`, `Grid`, `Card`, `Dialog`.

#![cfg(feature = "builtin")]

use anyhow::Result;
use serde_json::Value;

use codeforge_core::expr::eval::{to_js_string, to_number};
use codeforge_core::expr::truthy;

use crate::component::Props;
use crate::registry::ComponentRegistry;

pub mod display;
pub mod editor;
pub mod input;
pub mod layout;

/// Register every built-in component.
pub fn register_builtins(reg: &mut ComponentRegistry) -> Result<()> {
    display::register(reg)?;
    input::register(reg)?;
    layout::register(reg)?;
    editor::register(reg)?;
    tracing::debug!(count = reg.len(), "built-in components registered");
    Ok(())
}

/// Display string of a prop; absent props are `None`.
pub(crate) fn text(props: &Props, name: &str) -> Option<String> {
    Some(to_js_string(&Some(props.get(name)?.clone())))
}

pub(crate) fn flag(props: &Props, name: &str) -> bool {
    truthy(&props.get(name).cloned())
}

pub(crate) fn number(props: &Props, name: &str) -> Option<f64> {
    let n = to_number(&Some(props.get(name)?.clone()));
    n.is_finite().then_some(n)
}

/// Items of an array prop; anything else is empty.
pub(crate) fn items<'p>(props: &'p Props, name: &str) -> &'p [Value] {
    match props.get(name) {
        Some(Value::Array(a)) => a,
        _ => &[],
    }
}

/// Best label for one list item.
pub(crate) fn item_label(item: &Value) -> String {
    if let Value::Object(map) = item {
        for key in ["title", "text", "label", "name"] {
            if let Some(v) = map.get(key) {
                return to_js_string(&Some(v.clone()));
            }
        }
    }
    to_js_string(&Some(item.clone()))
}
