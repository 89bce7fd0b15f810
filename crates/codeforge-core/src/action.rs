//! Action dispatcher.
//!
//! Executes the compiled action list of one event against the live
//! [`DataSourceRegistry`]. Actions run sequentially and each one sees the state
//! left by the previous one. A malformed action (wrong target type, missing
//! value, unmatched item) is logged and skipped; the rest of the list still runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::datasource::DataSourceRegistry;
use crate::diagnostics::Diagnostics;
use crate::errors::ForgeError;
use crate::expr::eval::{loose_eq, number, to_js_string};
use crate::expr::{drill, split_path, Evaluator, Expr, Resolvable, Scope, Val};
use crate::model::{ActionDecl, ActionType};

/// A toast raised by `show-toast`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub message: String,
    pub variant: String,
}

/// Receives `show-toast` effects.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Receives `navigate` effects.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: &str);
}

/// Records every effect it receives. Used by the CLI and tests, and as the
/// default collaborator of a page without a host UI.
#[derive(Debug, Default)]
pub struct EffectLog {
    toasts: Mutex<Vec<Toast>>,
    navigations: Mutex<Vec<String>>,
}

impl EffectLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    /// Drain both logs.
    pub fn take(&self) -> (Vec<Toast>, Vec<String>) {
        (
            std::mem::take(&mut *self.toasts.lock()),
            std::mem::take(&mut *self.navigations.lock()),
        )
    }
}

impl Notifier for EffectLog {
    fn notify(&self, toast: Toast) {
        tracing::info!(message = %toast.message, variant = %toast.variant, "toast");
        self.toasts.lock().push(toast);
    }
}

impl Navigator for EffectLog {
    fn navigate(&self, to: &str) {
        tracing::info!(%to, "navigate");
        self.navigations.lock().push(to.to_string());
    }
}

/// External effect sinks handed to the dispatcher.
#[derive(Clone)]
pub struct Effects {
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

impl Effects {
    pub fn new(notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Self {
        Self { notifier, navigator }
    }

    /// Route both kinds of effect into one log.
    pub fn logged(log: Arc<EffectLog>) -> Self {
        Self {
            notifier: log.clone(),
            navigator: log,
        }
    }
}

/// Where an action's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// Expression evaluated with `event` in scope.
    Compute(Expr),
    /// Dot path into the event payload; empty means the whole payload.
    Event(Vec<String>),
    Literal(Resolvable),
}

/// An action declaration compiled at schema-load time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAction {
    pub kind: ActionType,
    pub target: Option<String>,
    pub value: Option<ValueSource>,
    pub path: Vec<String>,
    pub item_id: Option<Resolvable>,
    pub id_field: String,
    pub step: Option<Resolvable>,
    pub message: Option<Resolvable>,
    pub variant: Option<String>,
    pub to: Option<Resolvable>,
}

impl CompiledAction {
    /// Compile one declaration. Problems are pushed to `diags` under `at`;
    /// `None` is returned when the action cannot run at all.
    pub fn compile(decl: &ActionDecl, at: &str, diags: &mut Diagnostics) -> Option<Self> {
        let Some(kind) = decl.action_type() else {
            diags.push_error(
                "schema.unknown_action",
                format!("unknown action type: {}", decl.kind),
                format!("{at}.type"),
            );
            return None;
        };

        let mut ok = true;
        let mut resolvable = |field: &str, raw: &Option<Value>| -> Option<Resolvable> {
            let raw = raw.as_ref()?;
            match Resolvable::compile(raw) {
                Ok(r) => Some(r),
                Err(e) => {
                    diags.push_error("schema.expression", e.to_string(), format!("{at}.{field}"));
                    ok = false;
                    None
                }
            }
        };

        let literal = resolvable("value", &decl.value);
        let item_id = resolvable("itemId", &decl.item_id);
        let step = resolvable("step", &decl.step);
        let message = resolvable("message", &decl.message);
        let to = resolvable("to", &decl.to);

        let value = if let Some(src) = &decl.compute {
            match Expr::parse_lenient(src) {
                Ok(e) => Some(ValueSource::Compute(e)),
                Err(e) => {
                    diags.push_error("schema.expression", e.to_string(), format!("{at}.compute"));
                    ok = false;
                    None
                }
            }
        } else if let Some(from) = &decl.value_from {
            let mut path = split_path(from);
            if path.first().map(String::as_str) == Some("event") {
                path.remove(0);
            }
            Some(ValueSource::Event(path))
        } else {
            literal.map(ValueSource::Literal)
        };

        if kind.needs_target() && decl.target.is_none() {
            diags.push_error(
                "schema.missing_target",
                format!("{} action requires a target", kind.as_str()),
                at.to_string(),
            );
            ok = false;
        }

        ok.then(|| Self {
            kind,
            target: decl.target.clone(),
            value,
            path: decl.path.as_deref().map(split_path).unwrap_or_default(),
            item_id,
            id_field: decl.id_field.clone().unwrap_or_else(|| "id".to_string()),
            step,
            message,
            variant: decl.variant.clone(),
            to,
        })
    }

    /// Data-source ids read by the action's expressions (targets excluded).
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        match &self.value {
            Some(ValueSource::Compute(e)) => out.extend(e.references()),
            Some(ValueSource::Literal(r)) => out.extend(r.references()),
            _ => {}
        }
        for r in [&self.item_id, &self.step, &self.message, &self.to].into_iter().flatten() {
            out.extend(r.references());
        }
        out.remove("event");
        out
    }
}

#[derive(Debug, Error)]
enum ActionError {
    #[error("{0} action has no target")]
    MissingTarget(&'static str),
    #[error("{action} expects {expected} at {target}, found {found}")]
    TypeMismatch {
        action: &'static str,
        target: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0} action has no value")]
    MissingValue(&'static str),
    #[error("no item with {field} = {id} in {target}")]
    ItemNotFound { target: String, field: String, id: String },
    #[error("{0} action could not determine an item id")]
    MissingItemId(&'static str),
    #[error(transparent)]
    Registry(#[from] ForgeError),
}

/// Summary of one dispatched action list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub changed: BTreeSet<String>,
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionDispatcher {
    evaluator: Evaluator,
}

impl ActionDispatcher {
    pub fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }

    /// Run `actions` in order against the registry.
    pub fn dispatch(
        &self,
        actions: &[CompiledAction],
        event: &Val,
        registry: &mut DataSourceRegistry,
        effects: &Effects,
    ) -> DispatchOutcome {
        let mut out = DispatchOutcome::default();
        for action in actions {
            match self.run(action, event, registry, effects) {
                Ok(changed) => {
                    out.applied += 1;
                    out.changed.extend(changed);
                }
                Err(err) => {
                    out.skipped += 1;
                    tracing::warn!(
                        action = action.kind.as_str(),
                        target = action.target.as_deref().unwrap_or(""),
                        error = %err,
                        "action skipped"
                    );
                }
            }
        }
        out
    }

    fn run(
        &self,
        action: &CompiledAction,
        event: &Val,
        registry: &mut DataSourceRegistry,
        effects: &Effects,
    ) -> Result<BTreeSet<String>, ActionError> {
        let name = action.kind.as_str();
        match action.kind {
            ActionType::ShowToast => {
                let message = self
                    .resolve(action.message.as_ref(), event, registry)
                    .or_else(|| self.derive(action, event, registry).ok().flatten());
                effects.notifier.notify(Toast {
                    message: message.map(|m| to_js_string(&Some(m))).unwrap_or_default(),
                    variant: action.variant.clone().unwrap_or_else(|| "info".to_string()),
                });
                return Ok(BTreeSet::new());
            }
            ActionType::Navigate => {
                let to = self
                    .resolve(action.to.as_ref(), event, registry)
                    .or_else(|| self.derive(action, event, registry).ok().flatten())
                    .ok_or(ActionError::MissingValue(name))?;
                effects.navigator.navigate(&to_js_string(&Some(to)));
                return Ok(BTreeSet::new());
            }
            _ => {}
        }

        let target = action.target.as_deref().ok_or(ActionError::MissingTarget(name))?;
        let current = registry.get(target)?.clone();
        let mismatch = |expected: &'static str| ActionError::TypeMismatch {
            action: name,
            target: target.to_string(),
            expected,
            found: kind_of(&current),
        };

        let next = match action.kind {
            ActionType::SetValue => {
                let value = self
                    .derive(action, event, registry)?
                    .unwrap_or(Value::Null);
                if action.path.is_empty() {
                    value
                } else {
                    let mut root = match &current {
                        Value::Null => Value::Object(Map::new()),
                        Value::Object(_) => current.clone(),
                        _ => return Err(mismatch("an object")),
                    };
                    write_path(&mut root, &action.path, value).map_err(|_| mismatch("nested objects"))?;
                    root
                }
            }
            ActionType::ToggleValue => match current {
                Value::Bool(b) => Value::Bool(!b),
                Value::Null => Value::Bool(true),
                _ => return Err(mismatch("a boolean")),
            },
            ActionType::Increment | ActionType::Decrement => {
                let Some(n) = current.as_f64() else {
                    return Err(mismatch("a number"));
                };
                let step = match self.resolve(action.step.as_ref(), event, registry) {
                    None => 1.0,
                    Some(v) => v.as_f64().ok_or_else(|| mismatch("a numeric step"))?,
                };
                let delta = if action.kind == ActionType::Increment { step } else { -step };
                number(n + delta).ok_or_else(|| mismatch("a finite number"))?
            }
            ActionType::Create => {
                let mut items = array_of(&current).ok_or_else(|| mismatch("an array"))?;
                let mut item = self
                    .derive(action, event, registry)?
                    .ok_or(ActionError::MissingValue(name))?;
                if let Value::Object(fields) = &mut item {
                    if !fields.contains_key(&action.id_field) {
                        fields.insert(
                            action.id_field.clone(),
                            Value::String(uuid::Uuid::new_v4().to_string()),
                        );
                    }
                }
                items.push(item);
                Value::Array(items)
            }
            ActionType::Update => {
                let mut items = array_of(&current).ok_or_else(|| mismatch("an array"))?;
                let patch = self
                    .derive(action, event, registry)?
                    .ok_or(ActionError::MissingValue(name))?;
                let id = self
                    .resolve(action.item_id.as_ref(), event, registry)
                    .or_else(|| patch.get(&action.id_field).cloned())
                    .ok_or(ActionError::MissingItemId(name))?;
                let idx = find_item(&items, &action.id_field, &id)
                    .ok_or_else(|| not_found(target, action, &id))?;
                match (&mut items[idx], patch) {
                    (Value::Object(item), Value::Object(fields)) => item.extend(fields),
                    (slot, replacement) => *slot = replacement,
                }
                Value::Array(items)
            }
            ActionType::Delete => {
                let mut items = array_of(&current).ok_or_else(|| mismatch("an array"))?;
                let id = match self.resolve(action.item_id.as_ref(), event, registry) {
                    Some(id) => id,
                    None => match self.derive(action, event, registry)? {
                        Some(Value::Object(o)) => o
                            .get(&action.id_field)
                            .cloned()
                            .ok_or(ActionError::MissingItemId(name))?,
                        Some(v) => v,
                        None => return Err(ActionError::MissingItemId(name)),
                    },
                };
                let idx = find_item(&items, &action.id_field, &id)
                    .ok_or_else(|| not_found(target, action, &id))?;
                items.remove(idx);
                Value::Array(items)
            }
            ActionType::OpenDialog => self
                .derive(action, event, registry)?
                .unwrap_or(Value::Bool(true)),
            ActionType::CloseDialog => match current {
                Value::String(_) => Value::Null,
                _ => Value::Bool(false),
            },
            ActionType::ShowToast | ActionType::Navigate => {
                return Err(ActionError::Registry(ForgeError::invariant(
                    "effect actions are handled before target lookup",
                )))
            }
        };

        Ok(registry.set(target, next)?.changed)
    }

    /// Value by precedence: `compute` > `valueFrom` > `value`. `Ok(None)` when
    /// the source resolved to undefined or the action declares none.
    fn derive(
        &self,
        action: &CompiledAction,
        event: &Val,
        registry: &DataSourceRegistry,
    ) -> Result<Val, ActionError> {
        let ctx = registry.context();
        let scope = Scope::new(ctx).with_var("event", event.clone());
        match &action.value {
            None => Ok(None),
            Some(ValueSource::Compute(e)) => Ok(e.eval(&self.evaluator, &scope)?),
            Some(ValueSource::Event(path)) => Ok(event.as_ref().and_then(|ev| drill(ev, path)).cloned()),
            Some(ValueSource::Literal(r)) => Ok(r.resolve(&self.evaluator, &scope)),
        }
    }

    fn resolve(&self, r: Option<&Resolvable>, event: &Val, registry: &DataSourceRegistry) -> Val {
        let scope = Scope::new(registry.context()).with_var("event", event.clone());
        r?.resolve(&self.evaluator, &scope)
    }
}

fn array_of(v: &Value) -> Option<Vec<Value>> {
    match v {
        Value::Array(items) => Some(items.clone()),
        Value::Null => Some(Vec::new()),
        _ => None,
    }
}

fn find_item(items: &[Value], field: &str, id: &Value) -> Option<usize> {
    let id = Some(id.clone());
    items
        .iter()
        .position(|item| loose_eq(&item.get(field).cloned(), &id))
}

fn not_found(target: &str, action: &CompiledAction, id: &Value) -> ActionError {
    ActionError::ItemNotFound {
        target: target.to_string(),
        field: action.id_field.clone(),
        id: to_js_string(&Some(id.clone())),
    }
}

/// Write `value` at `path` inside `root`, creating intermediate objects.
fn write_path(root: &mut Value, path: &[String], value: Value) -> Result<(), ()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut cur = root;
    for seg in parents {
        if cur.is_null() {
            *cur = Value::Object(Map::new());
        }
        cur = match cur {
            Value::Object(map) => map.entry(seg.clone()).or_insert(Value::Null),
            _ => return Err(()),
        };
    }
    if cur.is_null() {
        *cur = Value::Object(Map::new());
    }
    match cur {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        _ => Err(()),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::SourceDef;
    use serde_json::json;

    fn registry() -> DataSourceRegistry {
        DataSourceRegistry::new(vec![
            SourceDef::static_value("count", json!(0)),
            SourceDef::static_value("flag", json!(false)),
            SourceDef::static_value("todos", json!([{"id": "a", "title": "first", "done": false}])),
            SourceDef::static_value("dialog", json!(false)),
            SourceDef::static_value("form", json!({"user": {"name": "Ada"}})),
            SourceDef::static_value("label", json!("hello")),
        ])
        .unwrap()
    }

    fn compile(v: Value) -> CompiledAction {
        let decl: ActionDecl = serde_json::from_value(v).unwrap();
        let mut diags = Diagnostics::new();
        let action = CompiledAction::compile(&decl, "test", &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.errors());
        action.unwrap()
    }

    fn fire(reg: &mut DataSourceRegistry, actions: &[Value], event: Val) -> (DispatchOutcome, Arc<EffectLog>) {
        let log = EffectLog::new();
        let compiled: Vec<_> = actions.iter().cloned().map(compile).collect();
        let out = ActionDispatcher::default().dispatch(&compiled, &event, reg, &Effects::logged(log.clone()));
        (out, log)
    }

    #[test]
    fn increment_decrement_with_step() {
        let mut reg = registry();
        let inc = json!({"type": "increment", "target": "count"});
        for _ in 0..3 {
            fire(&mut reg, &[inc.clone()], None);
        }
        assert_eq!(reg.get("count").unwrap(), &json!(3));
        fire(&mut reg, &[json!({"type": "decrement", "target": "count", "step": 0.5})], None);
        assert_eq!(reg.get("count").unwrap(), &json!(2.5));
    }

    #[test]
    fn increment_on_non_number_is_noop() {
        let mut reg = registry();
        let (out, _) = fire(
            &mut reg,
            &[
                json!({"type": "increment", "target": "label"}),
                json!({"type": "increment", "target": "count"}),
            ],
            None,
        );
        assert_eq!(out.skipped, 1);
        assert_eq!(out.applied, 1);
        assert_eq!(reg.get("label").unwrap(), &json!("hello"));
        assert_eq!(reg.get("count").unwrap(), &json!(1));
    }

    #[test]
    fn toggle_flips_booleans_only() {
        let mut reg = registry();
        fire(&mut reg, &[json!({"type": "toggle-value", "target": "flag"})], None);
        assert_eq!(reg.get("flag").unwrap(), &json!(true));
        let (out, _) = fire(&mut reg, &[json!({"type": "toggle-value", "target": "count"})], None);
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn value_precedence_compute_then_event_then_literal() {
        let mut reg = registry();
        let action = json!({
            "type": "set-value", "target": "label",
            "compute": "event.text.toUpperCase()", "valueFrom": "event.text", "value": "literal"
        });
        fire(&mut reg, &[action], Some(json!({"text": "typed"})));
        assert_eq!(reg.get("label").unwrap(), &json!("TYPED"));

        let action = json!({"type": "set-value", "target": "label", "valueFrom": "event.text", "value": "literal"});
        fire(&mut reg, &[action], Some(json!({"text": "typed"})));
        assert_eq!(reg.get("label").unwrap(), &json!("typed"));

        let action = json!({"type": "set-value", "target": "label", "value": "count is {{count}}"});
        fire(&mut reg, &[action], None);
        assert_eq!(reg.get("label").unwrap(), &json!("count is 0"));
    }

    #[test]
    fn set_value_writes_nested_path() {
        let mut reg = registry();
        let action = json!({"type": "set-value", "target": "form", "path": "user.address.city", "valueFrom": "event"});
        fire(&mut reg, &[action], Some(json!("Paris")));
        assert_eq!(
            reg.get("form").unwrap(),
            &json!({"user": {"name": "Ada", "address": {"city": "Paris"}}})
        );
    }

    #[test]
    fn create_assigns_id_and_appends() {
        let mut reg = registry();
        let action = json!({"type": "create", "target": "todos", "compute": "({title: event, done: false})"});
        let (out, _) = fire(&mut reg, &[action], Some(json!("second")));
        assert!(out.changed.contains("todos"));
        let todos = reg.get("todos").unwrap().as_array().unwrap().clone();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[1]["title"], "second");
        assert_eq!(todos[1]["id"].as_str().unwrap().len(), 36);
    }

    #[test]
    fn update_merges_and_delete_removes() {
        let mut reg = registry();
        let update = json!({"type": "update", "target": "todos", "itemId": "{{event.id}}", "compute": "({done: true})"});
        fire(&mut reg, &[update], Some(json!({"id": "a"})));
        assert_eq!(
            reg.get("todos").unwrap(),
            &json!([{"id": "a", "title": "first", "done": true}])
        );

        let delete = json!({"type": "delete", "target": "todos", "valueFrom": "event"});
        fire(&mut reg, &[delete], Some(json!({"id": "a"})));
        assert_eq!(reg.get("todos").unwrap(), &json!([]));
    }

    #[test]
    fn unmatched_item_is_noop() {
        let mut reg = registry();
        let delete = json!({"type": "delete", "target": "todos", "itemId": "zzz"});
        let (out, _) = fire(&mut reg, &[delete], None);
        assert_eq!(out.skipped, 1);
        assert_eq!(reg.get("todos").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn dialogs_open_and_close() {
        let mut reg = registry();
        fire(&mut reg, &[json!({"type": "open-dialog", "target": "dialog"})], None);
        assert_eq!(reg.get("dialog").unwrap(), &json!(true));
        fire(&mut reg, &[json!({"type": "close-dialog", "target": "dialog"})], None);
        assert_eq!(reg.get("dialog").unwrap(), &json!(false));

        fire(&mut reg, &[json!({"type": "open-dialog", "target": "label", "value": "edit-a"})], None);
        assert_eq!(reg.get("label").unwrap(), &json!("edit-a"));
        fire(&mut reg, &[json!({"type": "close-dialog", "target": "label"})], None);
        assert_eq!(reg.get("label").unwrap(), &json!(null));
    }

    #[test]
    fn effects_reach_collaborators() {
        let mut reg = registry();
        let (out, log) = fire(
            &mut reg,
            &[
                json!({"type": "show-toast", "message": "Saved {{count}}", "variant": "success"}),
                json!({"type": "navigate", "to": "/todos"}),
            ],
            None,
        );
        assert_eq!(out.applied, 2);
        assert!(out.changed.is_empty());
        assert_eq!(
            log.toasts(),
            vec![Toast { message: "Saved 0".into(), variant: "success".into() }]
        );
        assert_eq!(log.navigations(), vec!["/todos".to_string()]);
    }

    #[test]
    fn later_actions_see_earlier_writes() {
        let mut reg = registry();
        fire(
            &mut reg,
            &[
                json!({"type": "increment", "target": "count", "step": 2}),
                json!({"type": "set-value", "target": "label", "compute": "'n=' + count"}),
            ],
            None,
        );
        assert_eq!(reg.get("label").unwrap(), &json!("n=2"));
    }

    #[test]
    fn compile_reports_problems() {
        let mut diags = Diagnostics::new();
        let bad: ActionDecl = serde_json::from_value(json!({"type": "explode"})).unwrap();
        assert!(CompiledAction::compile(&bad, "a", &mut diags).is_none());
        let untargeted: ActionDecl = serde_json::from_value(json!({"type": "increment"})).unwrap();
        assert!(CompiledAction::compile(&untargeted, "b", &mut diags).is_none());
        let codes: Vec<_> = diags.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["schema.unknown_action", "schema.missing_target"]);
    }
}
