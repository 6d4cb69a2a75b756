//! Logical column schema for dataframe outputs.
//!
//! Schemas are derived by node validation (§4.1 of the execution-core spec)
//! and are never authored directly by a user; this module only defines the
//! shape.

use serde::{Deserialize, Serialize};

/// A logical column type. Deliberately coarser than any single dataframe
/// engine's physical type system: the registry's validators map engine
/// types down to this fixed enum so that schema comparisons (for caching
/// and for UI display) do not depend on which backend produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Utf8,
    Boolean,
    Date,
    Datetime,
    Decimal { precision: u8, scale: u8 },
    List { inner: Box<ColumnType> },
    Struct { fields: Vec<ColumnSchema> },
    Null,
}

impl ColumnType {
    /// Whether this type can represent the other without loss, used by the
    /// `select` node's `keep_missing`/type-cast policy to decide whether a
    /// cast is a widening (always allowed) or narrowing (rejected unless
    /// explicit) conversion.
    pub fn widens_to(&self, other: &ColumnType) -> bool {
        use ColumnType::*;
        match (self, other) {
            (a, b) if a == b => true,
            (Int8, Int16 | Int32 | Int64 | Float32 | Float64) => true,
            (Int16, Int32 | Int64 | Float32 | Float64) => true,
            (Int32, Int64 | Float64) => true,
            (UInt8, UInt16 | UInt32 | UInt64 | Int16 | Int32 | Int64 | Float32 | Float64) => true,
            (UInt16, UInt32 | UInt64 | Int32 | Int64 | Float64) => true,
            (UInt32, UInt64 | Int64 | Float64) => true,
            (Float32, Float64) => true,
            (Null, _) => true,
            _ => false,
        }
    }
}

/// One column of a schema: a name, its logical type, and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, dtype: ColumnType) -> Self {
        Self {
            name: name.into(),
            dtype,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// An ordered list of columns — the schema of one node output port.
pub type Schema = Vec<ColumnSchema>;

/// Look up a column by name within a schema.
pub fn find_column<'a>(schema: &'a Schema, name: &str) -> Option<&'a ColumnSchema> {
    schema.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_to_float() {
        assert!(ColumnType::Int32.widens_to(&ColumnType::Float64));
        assert!(!ColumnType::Float64.widens_to(&ColumnType::Int32));
    }

    #[test]
    fn null_widens_to_anything() {
        assert!(ColumnType::Null.widens_to(&ColumnType::Utf8));
    }

    #[test]
    fn find_column_by_name() {
        let schema = vec![
            ColumnSchema::new("id", ColumnType::Int64).not_null(),
            ColumnSchema::new("name", ColumnType::Utf8),
        ];
        assert!(find_column(&schema, "name").is_some());
        assert!(find_column(&schema, "missing").is_none());
    }
}
