//! The `NodeDescriptor` trait: the contract every node kind implements
//! (spec §4.2).

use crate::plan::{ArtifactRef, PlanOp};
use crate::schema::SettingsSchema;
use flowfile_types::{FlowfileError, Schema, SettingsValue};

/// Node category, metadata only — used for UI grouping, never interpreted
/// by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Input,
    Transform,
    Combine,
    Aggregate,
    Output,
}

/// How many inputs/outputs a kind exposes. `has_right_input` distinguishes
/// the two-input kinds (join, cross_join) from single-input ones; `union`
/// instead uses `main_input_count` to describe its N-ary fan-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeShape {
    pub main_input_count: u32,
    pub has_right_input: bool,
    pub output_count: u32,
}

impl NodeShape {
    pub const fn single_in_single_out() -> Self {
        NodeShape {
            main_input_count: 1,
            has_right_input: false,
            output_count: 1,
        }
    }

    pub const fn source() -> Self {
        NodeShape {
            main_input_count: 0,
            has_right_input: false,
            output_count: 1,
        }
    }

    pub const fn sink() -> Self {
        NodeShape {
            main_input_count: 1,
            has_right_input: false,
            output_count: 0,
        }
    }

    pub const fn two_input() -> Self {
        NodeShape {
            main_input_count: 1,
            has_right_input: true,
            output_count: 1,
        }
    }

    pub fn total_inputs(&self) -> u32 {
        self.main_input_count + self.has_right_input as u32
    }
}

/// A node kind's full contract: shape, category, settings schema,
/// validator and plan builder (spec §4.2).
pub trait NodeDescriptor: Send + Sync {
    fn kind_name(&self) -> &'static str;
    fn shape(&self) -> NodeShape;
    fn category(&self) -> NodeCategory;
    fn settings_schema(&self) -> SettingsSchema;

    /// Pure function: given settings and the schemas of connected inputs
    /// (in port order), return the output schemas or a validation error.
    /// Calling this twice with identical inputs must yield identical
    /// results (spec §8 invariant 2).
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError>;

    /// Build the worker-executable plan for this node, given its validated
    /// settings and the resolved artifacts of its inputs in port order.
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError>;
}

impl std::fmt::Debug for dyn NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("kind_name", &self.kind_name())
            .finish()
    }
}

/// Deserialize a settings record's `fields` into a concrete settings type,
/// wrapping serde errors as a `FlowfileError::Validation` (every kind's
/// `validate` starts this way).
pub fn parse_settings<T: serde::de::DeserializeOwned>(
    settings: &SettingsValue,
) -> Result<T, FlowfileError> {
    serde_json::from_value(settings.fields.clone()).map_err(|e| FlowfileError::Validation {
        message: format!("invalid settings: {e}"),
    })
}
