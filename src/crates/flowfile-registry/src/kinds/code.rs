//! The escape-hatch kind: `polars_code` (spec §4.2), which runs a
//! user-authored expression over named, bound inputs. Because the body is
//! arbitrary, the registry cannot derive an output schema ahead of
//! execution — the worker reports the schema it actually produced back on
//! the `Artifact`, and the node carries an empty schema until a run
//! completes. Input arity is also settings-defined rather than fixed by
//! `shape()`, same as `union`.

use crate::descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
use crate::plan::{ArtifactRef, BoundInput, PlanOp};
use crate::schema::{FieldKind, FieldSchema, SettingsSchema};
use flowfile_types::{FlowfileError, Schema, SettingsValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolarsCodeSettings {
    pub bindings: Vec<BoundInput>,
    pub source: String,
}

pub struct PolarsCodeNode;

impl NodeDescriptor for PolarsCodeNode {
    fn kind_name(&self) -> &'static str {
        "polars_code"
    }
    fn shape(&self) -> NodeShape {
        NodeShape {
            main_input_count: u32::MAX,
            has_right_input: false,
            output_count: 1,
        }
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("bindings", FieldKind::Array).required(),
            FieldSchema::new("source", FieldKind::Text).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let parsed: PolarsCodeSettings = parse_settings(settings)?;
        if parsed.bindings.len() != inputs.len() {
            return Err(FlowfileError::validation(format!(
                "polars_code has {} bindings but {} connected inputs",
                parsed.bindings.len(),
                inputs.len()
            )));
        }
        if parsed.source.trim().is_empty() {
            return Err(FlowfileError::validation("polars_code source must not be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        for binding in &parsed.bindings {
            if !seen.insert(binding.name.as_str()) {
                return Err(FlowfileError::validation(format!(
                    "polars_code binding name '{}' is used more than once",
                    binding.name
                )));
            }
        }
        Ok(vec![Vec::new()])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let parsed: PolarsCodeSettings = parse_settings(settings)?;
        if parsed.bindings.len() != inputs.len() {
            return Err(FlowfileError::PlanInvalid {
                message: format!(
                    "polars_code has {} bindings but {} resolved inputs",
                    parsed.bindings.len(),
                    inputs.len()
                ),
            });
        }
        let bound = parsed
            .bindings
            .into_iter()
            .zip(inputs.iter().cloned())
            .map(|(binding, artifact)| (binding.name, artifact))
            .collect();
        Ok(PlanOp::PolarsCode {
            inputs: bound,
            source: parsed.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_binding_count() {
        let settings = SettingsValue::new(serde_json::json!({
            "bindings": [{"name": "left", "port_label": "input-0"}],
            "source": "left"
        }));
        let err = PolarsCodeNode.validate(&settings, &[]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn rejects_duplicate_binding_names() {
        let settings = SettingsValue::new(serde_json::json!({
            "bindings": [
                {"name": "df", "port_label": "input-0"},
                {"name": "df", "port_label": "input-1"}
            ],
            "source": "df"
        }));
        let err = PolarsCodeNode
            .validate(&settings, &[Vec::new(), Vec::new()])
            .unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn accepts_well_formed_single_binding() {
        let settings = SettingsValue::new(serde_json::json!({
            "bindings": [{"name": "df", "port_label": "input-0"}],
            "source": "df.select('id')"
        }));
        let out = PolarsCodeNode.validate(&settings, &[Vec::new()]).unwrap();
        assert_eq!(out.len(), 1);
    }
}
