//! Declarative settings-schema description, exposed to callers via
//! `GET /node_kinds` (spec §4.2: "The target implementation re-exposes this
//! to the UI via C7").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The UI widget a settings field should render as. Purely descriptive —
/// validation happens in the kind's `validate`, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Numeric,
    Bool,
    Array,
    SingleSelect,
    MultiSelect,
    ColumnSelector,
    SecretRef,
}

/// A constraint attached to a field, checked by the kind's `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    Min { value: f64 },
    Max { value: f64 },
    OneOf { values: Vec<String> },
}

/// One settings field's declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub required: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            constraints: Vec::new(),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_constraint(mut self, c: Constraint) -> Self {
        self.constraints.push(c);
        self
    }
}

/// The full settings schema of a node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SettingsSchema {
    pub fields: Vec<FieldSchema>,
}

impl SettingsSchema {
    pub fn new(fields: Vec<FieldSchema>) -> Self {
        Self { fields }
    }
}
