//! End-to-end page scenarios: mount a schema against a storage backend, fire
//! events and inspect data, rendered tree and recorded effects.

use std::sync::Arc;

use serde_json::{json, Value};

use codeforge_components::{ComponentRegistry, Page, PageEnv, Placeholder};
use codeforge_core::action::EffectLog;
use codeforge_core::model::PageSchema;
use codeforge_core::storage::{KvStorage, MemoryStorage};

fn components() -> Arc<ComponentRegistry> {
    Arc::new(ComponentRegistry::builtin().expect("builtin registry"))
}

fn schema(v: Value) -> PageSchema {
    PageSchema::from_value(v).expect("schema parses")
}

fn counter_schema() -> PageSchema {
    schema(json!({
        "id": "counter",
        "dataSources": [{"id": "count", "type": "static", "defaultValue": 0}],
        "components": [{
            "id": "root", "type": "Stack",
            "children": [
                {"id": "label", "type": "Text", "props": {"text": "Count: {{count}}"}},
                {"id": "inc", "type": "Button", "props": {"label": "+"},
                 "events": {"onClick": [{"type": "increment", "target": "count"}]}},
                {"id": "title", "type": "Heading", "props": {"text": "Counter"}}
            ]
        }]
    }))
}

fn todo_schema() -> PageSchema {
    schema(json!({
        "id": "todos",
        "dataSources": [
            {"id": "todos", "type": "kv", "key": "app:todos", "defaultValue": []},
            {"id": "stats", "type": "computed", "compute": "({total: todos.length, done: todos.filter(t => t.completed).length})", "dependencies": ["todos"]}
        ],
        "components": [{
            "id": "root", "type": "Card", "props": {"title": "Todos"},
            "children": [
                {"id": "total", "type": "DataCard", "props": {"title": "Total", "value": "{{stats.total}}"}},
                {"id": "list", "type": "List", "bindings": {"items": {"source": "todos"}}},
                {"id": "add", "type": "Button", "props": {"label": "Add"},
                 "events": {"onClick": [
                    {"type": "create", "target": "todos", "valueFrom": "event"},
                    {"type": "show-toast", "message": "Added {{event.text}}", "variant": "success"}
                 ]}},
                {"id": "remove", "type": "Button", "props": {"label": "Remove"},
                 "events": {"onClick": [{"type": "delete", "target": "todos", "valueFrom": "event.id"}]}}
            ]
        }]
    }))
}

#[tokio::test]
async fn counter_increments_three_times() {
    let log = EffectLog::new();
    let mut page = Page::mount(
        &counter_schema(),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(log),
    )
    .await
    .unwrap();

    for _ in 0..3 {
        page.fire("inc", "onClick", None).unwrap();
    }
    assert_eq!(page.get("count"), Some(&json!(3)));
    assert_eq!(page.find("label").unwrap().props["text"], json!("Count: 3"));
    assert!(page.to_html().contains("Count: 3"));
}

#[tokio::test]
async fn firing_rerenders_only_dependent_nodes() {
    let mut page = Page::mount(
        &counter_schema(),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();
    assert_eq!(page.last_render().rendered, 4);

    let out = page.fire("inc", "onClick", None).unwrap();
    assert_eq!(out.changed.len(), 1);
    assert_eq!(out.rendered, 1);
    assert_eq!(out.reused, 3);
}

#[tokio::test]
async fn computed_stats_follow_created_items() {
    let log = EffectLog::new();
    let mut page = Page::mount(
        &todo_schema(),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(log.clone()),
    )
    .await
    .unwrap();
    assert_eq!(page.get("stats").unwrap()["total"], json!(0));

    let out = page
        .fire("add", "onClick", Some(json!({"text": "Milk", "completed": false})))
        .unwrap();
    assert_eq!(out.applied, 2);
    assert!(out.changed.contains("todos") && out.changed.contains("stats"));

    assert_eq!(page.get("stats").unwrap()["total"], json!(1));
    let todos = page.get("todos").unwrap().as_array().unwrap().clone();
    assert_eq!(todos.len(), 1);
    assert!(todos[0]["id"].is_string(), "create assigns an id");
    assert_eq!(page.find("total").unwrap().props["value"], json!(1));

    let toasts = log.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Added Milk");
    assert_eq!(toasts[0].variant, "success");

    page.fire("remove", "onClick", Some(todos[0].clone())).unwrap();
    assert_eq!(page.get("stats").unwrap()["total"], json!(0));
}

#[tokio::test]
async fn unknown_component_type_renders_placeholder() {
    let page = Page::mount(
        &schema(json!({
            "id": "p",
            "components": [
                {"id": "before", "type": "Text", "props": {"text": "A"}},
                {"id": "bogus", "type": "Bogus"},
                {"id": "after", "type": "Text", "props": {"text": "B"}}
            ]
        })),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();

    assert_eq!(page.tree().len(), 3);
    assert_eq!(page.find("bogus").unwrap().placeholder, Some(Placeholder::UnknownType));
    let html = page.to_html();
    assert!(html.contains("Unknown component: Bogus"));
    assert!(html.contains(">A</span>") && html.contains(">B</span>"));
}

#[tokio::test]
async fn broken_binding_degrades_one_prop() {
    let page = Page::mount(
        &schema(json!({
            "id": "p",
            "components": [
                {"id": "broken", "type": "Text", "props": {"text": "{{nonexistent.field}}"}},
                {"id": "fine", "type": "Text", "props": {"text": "ok"}}
            ]
        })),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();

    let broken = page.find("broken").unwrap();
    assert!(!broken.props.contains_key("text"));
    assert!(!broken.is_placeholder());
    assert_eq!(page.find("fine").unwrap().props["text"], json!("ok"));
    assert!(page
        .diagnostics()
        .iter()
        .any(|d| d.code == "schema.unknown_reference"));
}

#[tokio::test]
async fn storage_failure_keeps_in_memory_value() {
    let storage = Arc::new(MemoryStorage::new());
    storage.reject_writes(true);
    let mut page = Page::mount(
        &todo_schema(),
        components(),
        storage.clone(),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();

    page.fire("add", "onClick", Some(json!({"text": "Eggs"}))).unwrap();
    assert_eq!(page.get("todos").unwrap().as_array().unwrap().len(), 1);

    page.flush().await;
    assert_eq!(page.persist_stats().unwrap().failed, 1);
    assert!(storage.get("app:todos").await.unwrap().is_none());
    assert_eq!(page.get("stats").unwrap()["total"], json!(1));
}

#[tokio::test]
async fn kv_values_survive_remount() {
    let storage = Arc::new(MemoryStorage::new());
    let mut first = Page::mount(
        &todo_schema(),
        components(),
        storage.clone(),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();
    first
        .fire("add", "onClick", Some(json!({"id": "t1", "text": "Bread"})))
        .unwrap();
    first.flush().await;
    first.unmount();

    let second = Page::mount(
        &todo_schema(),
        components(),
        storage.clone(),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();
    assert_eq!(second.get("todos"), Some(&json!([{"id": "t1", "text": "Bread"}])));
    assert_eq!(second.get("stats").unwrap()["total"], json!(1));
    assert!(second.to_html().contains("Bread"));
}

#[tokio::test]
async fn dialog_opens_and_closes_through_actions() {
    let mut page = Page::mount(
        &schema(json!({
            "id": "p",
            "dataSources": [{"id": "editing", "type": "static", "defaultValue": false}],
            "components": [
                {"id": "open", "type": "Button", "props": {"label": "Edit"},
                 "events": {"onClick": [{"type": "open-dialog", "target": "editing"}]}},
                {"id": "dlg", "type": "Dialog", "condition": "editing", "props": {"open": "{{editing}}", "title": "Edit"},
                 "children": [{"id": "close", "type": "Button", "props": {"label": "Close"},
                    "events": {"onClick": [{"type": "close-dialog", "target": "editing"}]}}]}
            ]
        })),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(EffectLog::new()),
    )
    .await
    .unwrap();

    assert!(page.find("dlg").is_none());
    page.fire("open", "onClick", None).unwrap();
    assert!(page.find("close").is_some());
    page.fire("close", "onClick", None).unwrap();
    assert_eq!(page.get("editing"), Some(&json!(false)));
    assert!(page.find("dlg").is_none());
}

#[tokio::test]
async fn navigate_goes_to_the_navigator() {
    let log = EffectLog::new();
    let mut page = Page::mount(
        &schema(json!({
            "id": "p",
            "dataSources": [{"id": "user", "type": "static", "defaultValue": {"id": 7}}],
            "components": [{"id": "go", "type": "Button",
                "events": {"onClick": [{"type": "navigate", "to": "/users/{{user.id}}"}]}}]
        })),
        components(),
        Arc::new(MemoryStorage::new()),
        PageEnv::logged(log.clone()),
    )
    .await
    .unwrap();

    let out = page.fire("go", "onClick", None).unwrap();
    assert!(out.changed.is_empty());
    assert_eq!(log.navigations(), vec!["/users/7".to_string()]);
}
