//! The data context: a mapping from data-source id to its current value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Materialized values of every declared data source of a page.
///
/// The data-source registry owns one of these and hands out shared references
/// to the resolver, so reads never copy the whole page state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataContext {
    values: BTreeMap<String, Value>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, id: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(id.into(), value)
    }

    pub fn remove(&mut self, id: &str) -> Option<Value> {
        self.values.remove(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Snapshot as a JSON object (for CLI/API output).
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Build a context from a JSON object. Non-object input yields an empty context.
    pub fn from_json(v: Value) -> Self {
        match v {
            Value::Object(map) => Self {
                values: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }
}

impl FromIterator<(String, Value)> for DataContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_roundtrip_keeps_keys() {
        let ctx = DataContext::from_json(json!({"count": 1, "user": {"name": "Ada"}}));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("count"), Some(&json!(1)));
        assert_eq!(ctx.to_json()["user"]["name"], "Ada");
    }

    #[test]
    fn non_object_is_empty() {
        assert!(DataContext::from_json(json!([1, 2])).is_empty());
    }
}
