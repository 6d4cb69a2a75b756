//! The node library: every built-in node kind's settings schema, schema
//! validator and plan builder (spec §4.2, C2).

pub mod descriptor;
pub mod kinds;
pub mod plan;
pub mod registry;
pub mod schema;

pub use descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
pub use plan::{
    AggFunc, Aggregation, ArtifactRef, BoundInput, FilterCondition, FilterPredicate,
    JoinHow, KeepMissingPolicy, KeepStrategy, PlanOp, SelectColumn, SortDirection, SortKey,
    UnionMode, WriteMode,
};
pub use registry::NodeRegistry;
pub use schema::{Constraint, FieldKind, FieldSchema, SettingsSchema};
