//! Multi-input combining kinds: `join`, `cross_join`, `union` (spec §4.2).

use crate::descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
use crate::plan::{ArtifactRef, JoinHow, PlanOp, UnionMode};
use crate::schema::{FieldKind, FieldSchema, SettingsSchema};
use flowfile_types::{FlowfileError, Schema, SettingsValue};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoinSettings {
    pub how: JoinHow,
    pub on: Vec<(String, String)>,
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

fn default_suffix() -> String {
    "_right".to_string()
}

pub struct JoinNode;

impl NodeDescriptor for JoinNode {
    fn kind_name(&self) -> &'static str {
        "join"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::two_input()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Combine
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("how", FieldKind::SingleSelect).required(),
            FieldSchema::new("on", FieldKind::Array).required(),
            FieldSchema::new("suffix", FieldKind::Text).with_default(serde_json::json!("_right")),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let [main, right] = inputs else {
            return Err(FlowfileError::validation(format!(
                "join expects exactly two inputs, got {}",
                inputs.len()
            )));
        };
        let parsed: JoinSettings = parse_settings(settings)?;
        if parsed.on.is_empty() {
            return Err(FlowfileError::validation("join requires at least one key pair"));
        }
        for (left_key, right_key) in &parsed.on {
            if flowfile_types::find_column(main, left_key).is_none() {
                return Err(FlowfileError::validation(format!(
                    "join left key '{left_key}' not found in main input"
                )));
            }
            if flowfile_types::find_column(right, right_key).is_none() {
                return Err(FlowfileError::validation(format!(
                    "join right key '{right_key}' not found in right input"
                )));
            }
        }
        let mut out = main.clone();
        let right_key_names: std::collections::HashSet<&str> =
            parsed.on.iter().map(|(_, r)| r.as_str()).collect();
        for col in right {
            if right_key_names.contains(col.name.as_str()) {
                continue;
            }
            let mut col = col.clone();
            if flowfile_types::find_column(main, &col.name).is_some() {
                col.name = format!("{}{}", col.name, parsed.suffix);
            }
            out.push(col);
        }
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let [main, right] = inputs else {
            return Err(FlowfileError::PlanInvalid {
                message: format!("join expects exactly two inputs, got {}", inputs.len()),
            });
        };
        let parsed: JoinSettings = parse_settings(settings)?;
        Ok(PlanOp::Join {
            main: main.clone(),
            right: right.clone(),
            how: parsed.how,
            on: parsed.on,
            suffix: parsed.suffix,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrossJoinSettings {
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

pub struct CrossJoinNode;

impl NodeDescriptor for CrossJoinNode {
    fn kind_name(&self) -> &'static str {
        "cross_join"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::two_input()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Combine
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("suffix", FieldKind::Text).with_default(serde_json::json!("_right")),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let [main, right] = inputs else {
            return Err(FlowfileError::validation(format!(
                "cross_join expects exactly two inputs, got {}",
                inputs.len()
            )));
        };
        let parsed: CrossJoinSettings = parse_settings(settings)?;
        let mut out = main.clone();
        for col in right {
            let mut col = col.clone();
            if flowfile_types::find_column(main, &col.name).is_some() {
                col.name = format!("{}{}", col.name, parsed.suffix);
            }
            out.push(col);
        }
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let [main, right] = inputs else {
            return Err(FlowfileError::PlanInvalid {
                message: format!("cross_join expects exactly two inputs, got {}", inputs.len()),
            });
        };
        let parsed: CrossJoinSettings = parse_settings(settings)?;
        Ok(PlanOp::CrossJoin {
            main: main.clone(),
            right: right.clone(),
            suffix: parsed.suffix,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnionSettings {
    #[serde(default = "default_union_mode")]
    pub mode: UnionMode,
}

fn default_union_mode() -> UnionMode {
    UnionMode::Relaxed
}

pub struct UnionNode;

impl NodeDescriptor for UnionNode {
    fn kind_name(&self) -> &'static str {
        "union"
    }
    fn shape(&self) -> NodeShape {
        NodeShape {
            main_input_count: 2,
            has_right_input: false,
            output_count: 1,
        }
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Combine
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("mode", FieldKind::SingleSelect)
            .with_default(serde_json::json!("relaxed"))])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        if inputs.len() < 2 {
            return Err(FlowfileError::validation(format!(
                "union expects at least two inputs, got {}",
                inputs.len()
            )));
        }
        let parsed: UnionSettings = parse_settings(settings)?;
        let first = &inputs[0];
        match parsed.mode {
            UnionMode::Diagonal => {
                // Diagonal union accepts mismatched schemas: the result is
                // the union of all columns seen across inputs, each
                // nullable (missing in inputs that didn't have it).
                let mut out = Vec::new();
                for schema in inputs {
                    for col in schema {
                        if flowfile_types::find_column(&out, &col.name).is_none() {
                            let mut col = col.clone();
                            col.nullable = true;
                            out.push(col);
                        }
                    }
                }
                Ok(vec![out])
            }
            UnionMode::Relaxed => {
                for (idx, schema) in inputs.iter().enumerate().skip(1) {
                    if schema.len() != first.len() {
                        return Err(FlowfileError::validation(format!(
                            "union input {idx} has {} columns, expected {}",
                            schema.len(),
                            first.len()
                        )));
                    }
                }
                Ok(vec![first.clone()])
            }
        }
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if inputs.len() < 2 {
            return Err(FlowfileError::PlanInvalid {
                message: format!("union expects at least two inputs, got {}", inputs.len()),
            });
        }
        let parsed: UnionSettings = parse_settings(settings)?;
        Ok(PlanOp::Union {
            inputs: inputs.to_vec(),
            mode: parsed.mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::{ColumnSchema, ColumnType};

    fn left() -> Schema {
        vec![
            ColumnSchema::new("id", ColumnType::Int64),
            ColumnSchema::new("name", ColumnType::Utf8),
        ]
    }
    fn right() -> Schema {
        vec![
            ColumnSchema::new("id", ColumnType::Int64),
            ColumnSchema::new("name", ColumnType::Utf8),
        ]
    }

    #[test]
    fn join_suffixes_colliding_right_columns() {
        let settings = SettingsValue::new(serde_json::json!({"how": "inner", "on": [["id", "id"]]}));
        let out = JoinNode.validate(&settings, &[left(), right()]).unwrap();
        assert!(out[0].iter().any(|c| c.name == "name_right"));
    }

    #[test]
    fn union_relaxed_requires_matching_column_count() {
        let mismatched = vec![ColumnSchema::new("id", ColumnType::Int64)];
        let settings = SettingsValue::new(serde_json::json!({}));
        let err = UnionNode.validate(&settings, &[left(), mismatched]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn union_diagonal_merges_distinct_columns() {
        let a = vec![ColumnSchema::new("id", ColumnType::Int64)];
        let b = vec![ColumnSchema::new("name", ColumnType::Utf8)];
        let settings = SettingsValue::new(serde_json::json!({"mode": "diagonal"}));
        let out = UnionNode.validate(&settings, &[a, b]).unwrap();
        assert_eq!(out[0].len(), 2);
    }
}
