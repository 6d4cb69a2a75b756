//! Per-node settings records.
//!
//! REDESIGN FLAG: the source system represents node settings as untyped
//! dictionaries. Here settings are a tagged union keyed by node kind
//! (`SettingsValue`), with the registry performing the tag dispatch
//! (`flowfile-registry`). Unknown fields encountered while deserializing a
//! known kind are preserved in `extra` so round-tripping a flow document
//! authored by a newer client does not silently drop data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of a node, as a registry key. Stored as a plain string (rather
/// than a closed Rust enum) so that the registry, not the data model, is
/// the single source of truth for which kinds exist — adding a kind never
/// requires touching this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKind(pub String);

impl NodeKind {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        NodeKind(s.to_string())
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node's settings record: the kind-specific fields the registry
/// validator understands, captured as JSON, plus any fields the validator
/// does not recognize. Kind-specific crates (the registry's built-in node
/// implementations) deserialize `fields` into their own typed struct; this
/// crate only needs to move the value around and hash it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsValue {
    pub fields: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl SettingsValue {
    pub fn new(fields: Value) -> Self {
        Self {
            fields,
            extra: Map::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// Canonicalized JSON bytes of this settings record, used as the input
    /// to the settings hash. Serde's `Map` is already insertion-ordered, so
    /// canonicalization sorts keys explicitly to guarantee two
    /// semantically-identical records (authored via different UI flows,
    /// producing different key orders) hash identically.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let canonical = canonicalize(&self.fields);
        serde_json::to_vec(&canonical).expect("json values always serialize")
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_are_order_independent() {
        let a = SettingsValue::new(json!({"b": 1, "a": 2}));
        let b = SettingsValue::new(json!({"a": 2, "b": 1}));
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn canonical_bytes_differ_on_value_change() {
        let a = SettingsValue::new(json!({"a": 1}));
        let b = SettingsValue::new(json!({"a": 2}));
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
    }
}
