//! Single-input transform kinds: `select`, `filter`, `sort`, `unique`,
//! `head`, `sample`, `record_id`, `formula` (spec §4.2).

use crate::descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
use crate::plan::{
    ArtifactRef, FilterCondition, KeepMissingPolicy, KeepStrategy, PlanOp, SelectColumn, SortKey,
};
use crate::schema::{FieldKind, FieldSchema, SettingsSchema};
use flowfile_types::{ColumnSchema, FlowfileError, Schema, SettingsValue};
use serde::{Deserialize, Serialize};

fn single_input<'a>(inputs: &'a [Schema], kind: &str) -> Result<&'a Schema, FlowfileError> {
    match inputs {
        [only] => Ok(only),
        _ => Err(FlowfileError::validation(format!(
            "{kind} expects exactly one input, got {}",
            inputs.len()
        ))),
    }
}

fn single_artifact<'a>(
    inputs: &'a [ArtifactRef],
    kind: &str,
) -> Result<&'a ArtifactRef, FlowfileError> {
    match inputs {
        [only] => Ok(only),
        _ => Err(FlowfileError::PlanInvalid {
            message: format!("{kind} expects exactly one input, got {}", inputs.len()),
        }),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectSettings {
    pub columns: Vec<SelectColumn>,
    #[serde(default = "default_keep_missing")]
    pub keep_missing: KeepMissingPolicy,
}

fn default_keep_missing() -> KeepMissingPolicy {
    KeepMissingPolicy::Drop
}

pub struct SelectNode;

impl NodeDescriptor for SelectNode {
    fn kind_name(&self) -> &'static str {
        "select"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("columns", FieldKind::ColumnSelector).required()])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "select")?;
        let parsed: SelectSettings = parse_settings(settings)?;
        let mut out: Schema = Vec::new();
        for col in &parsed.columns {
            if !col.keep {
                continue;
            }
            let src = flowfile_types::find_column(upstream, &col.source).ok_or_else(|| {
                FlowfileError::validation(format!("select references unknown column '{}'", col.source))
            })?;
            let name = col.rename.clone().unwrap_or_else(|| col.source.clone());
            let dtype = col.cast_to.clone().unwrap_or_else(|| src.dtype.clone());
            out.push(ColumnSchema {
                name,
                dtype,
                nullable: src.nullable,
            });
        }
        if parsed.keep_missing == KeepMissingPolicy::Keep {
            let named: std::collections::HashSet<&str> =
                parsed.columns.iter().map(|c| c.source.as_str()).collect();
            for col in upstream {
                if !named.contains(col.name.as_str()) {
                    out.push(col.clone());
                }
            }
        }
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "select")?.clone();
        let parsed: SelectSettings = parse_settings(settings)?;
        Ok(PlanOp::Select {
            input,
            columns: parsed.columns,
            keep_missing: parsed.keep_missing,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterSettings {
    pub condition: FilterCondition,
}

pub struct FilterNode;

impl NodeDescriptor for FilterNode {
    fn kind_name(&self) -> &'static str {
        "filter"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("condition", FieldKind::Text).required()])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "filter")?;
        let parsed: FilterSettings = parse_settings(settings)?;
        if let FilterCondition::Structured(pred) = &parsed.condition {
            if flowfile_types::find_column(upstream, &pred.field).is_none() {
                return Err(FlowfileError::validation(format!(
                    "filter references unknown column '{}'",
                    pred.field
                )));
            }
        }
        Ok(vec![upstream.clone()])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "filter")?.clone();
        let parsed: FilterSettings = parse_settings(settings)?;
        Ok(PlanOp::Filter {
            input,
            condition: parsed.condition,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SortSettings {
    pub keys: Vec<SortKey>,
}

pub struct SortNode;

impl NodeDescriptor for SortNode {
    fn kind_name(&self) -> &'static str {
        "sort"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("keys", FieldKind::Array).required()])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "sort")?;
        let parsed: SortSettings = parse_settings(settings)?;
        if parsed.keys.is_empty() {
            return Err(FlowfileError::validation("sort requires at least one key"));
        }
        for key in &parsed.keys {
            if flowfile_types::find_column(upstream, &key.column).is_none() {
                return Err(FlowfileError::validation(format!(
                    "sort references unknown column '{}'",
                    key.column
                )));
            }
        }
        Ok(vec![upstream.clone()])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "sort")?.clone();
        let parsed: SortSettings = parse_settings(settings)?;
        Ok(PlanOp::Sort {
            input,
            keys: parsed.keys,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UniqueSettings {
    #[serde(default)]
    pub subset: Vec<String>,
    #[serde(default = "default_keep")]
    pub keep: KeepStrategy,
}

fn default_keep() -> KeepStrategy {
    KeepStrategy::First
}

pub struct UniqueNode;

impl NodeDescriptor for UniqueNode {
    fn kind_name(&self) -> &'static str {
        "unique"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("subset", FieldKind::ColumnSelector)])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "unique")?;
        let parsed: UniqueSettings = parse_settings(settings)?;
        for col in &parsed.subset {
            if flowfile_types::find_column(upstream, col).is_none() {
                return Err(FlowfileError::validation(format!(
                    "unique references unknown column '{col}'"
                )));
            }
        }
        Ok(vec![upstream.clone()])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "unique")?.clone();
        let parsed: UniqueSettings = parse_settings(settings)?;
        Ok(PlanOp::Unique {
            input,
            subset: parsed.subset,
            keep: parsed.keep,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeadSettings {
    pub n: u64,
}

pub struct HeadNode;

impl NodeDescriptor for HeadNode {
    fn kind_name(&self) -> &'static str {
        "head"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("n", FieldKind::Numeric)
            .required()
            .with_constraint(crate::schema::Constraint::Min { value: 0.0 })])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "head")?;
        let _: HeadSettings = parse_settings(settings)?;
        Ok(vec![upstream.clone()])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "head")?.clone();
        let parsed: HeadSettings = parse_settings(settings)?;
        Ok(PlanOp::Head { input, n: parsed.n })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleSettings {
    pub n: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

pub struct SampleNode;

impl NodeDescriptor for SampleNode {
    fn kind_name(&self) -> &'static str {
        "sample"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("n", FieldKind::Numeric).required(),
            FieldSchema::new("seed", FieldKind::Numeric),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "sample")?;
        let _: SampleSettings = parse_settings(settings)?;
        Ok(vec![upstream.clone()])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "sample")?.clone();
        let parsed: SampleSettings = parse_settings(settings)?;
        Ok(PlanOp::Sample {
            input,
            n: parsed.n,
            seed: parsed.seed,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordIdSettings {
    pub output_name: String,
    #[serde(default)]
    pub start_at: i64,
}

pub struct RecordIdNode;

impl NodeDescriptor for RecordIdNode {
    fn kind_name(&self) -> &'static str {
        "record_id"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("output_name", FieldKind::Text).required(),
            FieldSchema::new("start_at", FieldKind::Numeric).with_default(serde_json::json!(0)),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "record_id")?;
        let parsed: RecordIdSettings = parse_settings(settings)?;
        if flowfile_types::find_column(upstream, &parsed.output_name).is_some() {
            return Err(FlowfileError::validation(format!(
                "record_id output column '{}' collides with an existing column",
                parsed.output_name
            )));
        }
        let mut out = upstream.clone();
        out.push(ColumnSchema::new(parsed.output_name, flowfile_types::ColumnType::Int64).not_null());
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "record_id")?.clone();
        let parsed: RecordIdSettings = parse_settings(settings)?;
        Ok(PlanOp::RecordId {
            input,
            output_name: parsed.output_name,
            start_at: parsed.start_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormulaSettings {
    pub output_name: String,
    pub expr: String,
    #[serde(default)]
    pub output_type: Option<flowfile_types::ColumnType>,
}

pub struct FormulaNode;

impl NodeDescriptor for FormulaNode {
    fn kind_name(&self) -> &'static str {
        "formula"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Transform
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("output_name", FieldKind::Text).required(),
            FieldSchema::new("expr", FieldKind::Text).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "formula")?;
        let parsed: FormulaSettings = parse_settings(settings)?;
        if parsed.expr.trim().is_empty() {
            return Err(FlowfileError::validation("formula expr must not be empty"));
        }
        let mut out: Schema = upstream
            .iter()
            .filter(|c| c.name != parsed.output_name)
            .cloned()
            .collect();
        let dtype = parsed.output_type.unwrap_or(flowfile_types::ColumnType::Utf8);
        out.push(ColumnSchema::new(parsed.output_name, dtype));
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "formula")?.clone();
        let parsed: FormulaSettings = parse_settings(settings)?;
        Ok(PlanOp::Formula {
            input,
            output_name: parsed.output_name,
            expr: parsed.expr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::ColumnType;

    fn schema() -> Schema {
        vec![
            ColumnSchema::new("id", ColumnType::Int64).not_null(),
            ColumnSchema::new("name", ColumnType::Utf8),
        ]
    }

    #[test]
    fn select_drops_unlisted_columns_by_default() {
        let settings = SettingsValue::new(serde_json::json!({
            "columns": [{"source": "id", "keep": true}]
        }));
        let out = SelectNode.validate(&settings, &[schema()]).unwrap();
        assert_eq!(out[0].len(), 1);
    }

    #[test]
    fn select_rejects_unknown_source_column() {
        let settings = SettingsValue::new(serde_json::json!({
            "columns": [{"source": "missing", "keep": true}]
        }));
        let err = SelectNode.validate(&settings, &[schema()]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn record_id_appends_int_column() {
        let settings = SettingsValue::new(serde_json::json!({"output_name": "row_id"}));
        let out = RecordIdNode.validate(&settings, &[schema()]).unwrap();
        assert_eq!(out[0].len(), 3);
    }

    #[test]
    fn record_id_rejects_name_collision() {
        let settings = SettingsValue::new(serde_json::json!({"output_name": "id"}));
        let err = RecordIdNode.validate(&settings, &[schema()]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn sort_requires_at_least_one_key() {
        let settings = SettingsValue::new(serde_json::json!({"keys": []}));
        let err = SortNode.validate(&settings, &[schema()]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }
}
