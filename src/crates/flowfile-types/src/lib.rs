//! Core data model for Flowfile's execution core: flows, nodes, edges,
//! schemas, settings, content hashes and artifacts.
//!
//! This crate holds data only. The invariants that make a `Flow` a legal
//! DAG (acyclicity, single-connection input ports, schema propagation) are
//! enforced by `flowfile-graph`, which owns behavior over these types.

pub mod artifact;
pub mod error;
pub mod flow;
pub mod hash;
pub mod ids;
pub mod node;
pub mod schema;
pub mod settings;

pub use artifact::{Artifact, ArtifactFormat};
pub use error::{FlowfileError, Result};
pub use flow::{ExecutionMode, Flow};
pub use hash::{ContentHash, Digest, EffectiveHash, SettingsHash};
pub use ids::{FlowId, NodeId, RunId, TaskId};
pub use node::{Edge, Node, Port, PortRole, Position, SchemaState, ValidationState};
pub use schema::{find_column, ColumnSchema, ColumnType, Schema};
pub use settings::{NodeKind, SettingsValue};
