//! Aggregating kinds: `group_by`, `pivot`, `unpivot` (spec §4.2).

use crate::descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
use crate::plan::{AggFunc, Aggregation, ArtifactRef, PlanOp};
use crate::schema::{FieldKind, FieldSchema, SettingsSchema};
use flowfile_types::{ColumnSchema, ColumnType, FlowfileError, Schema, SettingsValue};
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

fn agg_output_type(func: AggFunc, source_type: &ColumnType) -> ColumnType {
    match func {
        AggFunc::Count | AggFunc::NUnique => ColumnType::Int64,
        AggFunc::Mean | AggFunc::Median => ColumnType::Float64,
        AggFunc::Sum | AggFunc::Min | AggFunc::Max | AggFunc::First | AggFunc::Last => {
            source_type.clone()
        }
        AggFunc::Concat => ColumnType::Utf8,
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GroupBySettings {
    pub group_keys: Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

pub struct GroupByNode;

impl NodeDescriptor for GroupByNode {
    fn kind_name(&self) -> &'static str {
        "group_by"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Aggregate
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("group_keys", FieldKind::ColumnSelector),
            FieldSchema::new("aggregations", FieldKind::Array).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "group_by")?;
        let parsed: GroupBySettings = parse_settings(settings)?;
        if parsed.group_keys.is_empty() && parsed.aggregations.is_empty() {
            return Err(FlowfileError::validation(
                "group_by requires at least one group key or aggregation",
            ));
        }
        let mut out: Schema = Vec::new();
        for key in &parsed.group_keys {
            let col = flowfile_types::find_column(upstream, key).ok_or_else(|| {
                FlowfileError::validation(format!("group_by references unknown column '{key}'"))
            })?;
            out.push(col.clone());
        }
        for agg in &parsed.aggregations {
            let source = flowfile_types::find_column(upstream, &agg.source_column).ok_or_else(|| {
                FlowfileError::validation(format!(
                    "group_by aggregation references unknown column '{}'",
                    agg.source_column
                ))
            })?;
            out.push(ColumnSchema::new(
                agg.output_name.clone(),
                agg_output_type(agg.func, &source.dtype),
            ));
        }
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "group_by")?.clone();
        let parsed: GroupBySettings = parse_settings(settings)?;
        Ok(PlanOp::GroupBy {
            input,
            group_keys: parsed.group_keys,
            aggregations: parsed.aggregations,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PivotSettings {
    pub index: Vec<String>,
    pub columns: String,
    pub values: String,
    pub agg: AggFunc,
}

pub struct PivotNode;

impl NodeDescriptor for PivotNode {
    fn kind_name(&self) -> &'static str {
        "pivot"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Aggregate
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("index", FieldKind::ColumnSelector).required(),
            FieldSchema::new("columns", FieldKind::Text).required(),
            FieldSchema::new("values", FieldKind::Text).required(),
            FieldSchema::new("agg", FieldKind::SingleSelect).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "pivot")?;
        let parsed: PivotSettings = parse_settings(settings)?;
        for key in &parsed.index {
            if flowfile_types::find_column(upstream, key).is_none() {
                return Err(FlowfileError::validation(format!(
                    "pivot index references unknown column '{key}'"
                )));
            }
        }
        if flowfile_types::find_column(upstream, &parsed.columns).is_none() {
            return Err(FlowfileError::validation(format!(
                "pivot columns field references unknown column '{}'",
                parsed.columns
            )));
        }
        let values_col = flowfile_types::find_column(upstream, &parsed.values).ok_or_else(|| {
            FlowfileError::validation(format!(
                "pivot values field references unknown column '{}'",
                parsed.values
            ))
        })?;
        // The set of output columns depends on the distinct values of the
        // pivot column, which are data, not schema — only known once the
        // worker executes. We can only assert the index columns survive;
        // the full output schema is resolved by the worker after execution
        // and reported back via Artifact.schema.
        let mut out: Schema = parsed
            .index
            .iter()
            .map(|k| flowfile_types::find_column(upstream, k).unwrap().clone())
            .collect();
        out.push(ColumnSchema::new(
            format!("{}_pivoted", parsed.values),
            agg_output_type(parsed.agg, &values_col.dtype),
        ));
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "pivot")?.clone();
        let parsed: PivotSettings = parse_settings(settings)?;
        Ok(PlanOp::Pivot {
            input,
            index: parsed.index,
            columns: parsed.columns,
            values: parsed.values,
            agg: parsed.agg,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnpivotSettings {
    pub index: Vec<String>,
    pub value_columns: Vec<String>,
    #[serde(default = "default_name_to")]
    pub name_to: String,
    #[serde(default = "default_value_to")]
    pub value_to: String,
}

fn default_name_to() -> String {
    "variable".to_string()
}
fn default_value_to() -> String {
    "value".to_string()
}

pub struct UnpivotNode;

impl NodeDescriptor for UnpivotNode {
    fn kind_name(&self) -> &'static str {
        "unpivot"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::single_in_single_out()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Aggregate
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("index", FieldKind::ColumnSelector).required(),
            FieldSchema::new("value_columns", FieldKind::ColumnSelector).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        let upstream = single_input(inputs, "unpivot")?;
        let parsed: UnpivotSettings = parse_settings(settings)?;
        if parsed.value_columns.is_empty() {
            return Err(FlowfileError::validation(
                "unpivot requires at least one value column",
            ));
        }
        let mut out: Schema = Vec::new();
        for key in &parsed.index {
            let col = flowfile_types::find_column(upstream, key).ok_or_else(|| {
                FlowfileError::validation(format!("unpivot index references unknown column '{key}'"))
            })?;
            out.push(col.clone());
        }
        for name in &parsed.value_columns {
            if flowfile_types::find_column(upstream, name).is_none() {
                return Err(FlowfileError::validation(format!(
                    "unpivot value_columns references unknown column '{name}'"
                )));
            }
        }
        out.push(ColumnSchema::new(parsed.name_to.clone(), ColumnType::Utf8));
        out.push(ColumnSchema::new(parsed.value_to.clone(), ColumnType::Utf8));
        Ok(vec![out])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "unpivot")?.clone();
        let parsed: UnpivotSettings = parse_settings(settings)?;
        Ok(PlanOp::Unpivot {
            input,
            index: parsed.index,
            value_columns: parsed.value_columns,
            name_to: parsed.name_to,
            value_to: parsed.value_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        vec![
            ColumnSchema::new("region", ColumnType::Utf8),
            ColumnSchema::new("amount", ColumnType::Float64),
        ]
    }

    #[test]
    fn group_by_count_produces_int64_column() {
        let settings = SettingsValue::new(serde_json::json!({
            "group_keys": ["region"],
            "aggregations": [{"source_column": "amount", "output_name": "n", "func": "count"}]
        }));
        let out = GroupByNode.validate(&settings, &[schema()]).unwrap();
        assert_eq!(out[0][1].dtype, ColumnType::Int64);
    }

    #[test]
    fn group_by_requires_keys_or_aggregations() {
        let settings = SettingsValue::new(serde_json::json!({"group_keys": [], "aggregations": []}));
        let err = GroupByNode.validate(&settings, &[schema()]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn unpivot_appends_name_and_value_columns() {
        let settings = SettingsValue::new(serde_json::json!({
            "index": ["region"],
            "value_columns": ["amount"]
        }));
        let out = UnpivotNode.validate(&settings, &[schema()]).unwrap();
        assert_eq!(out[0].len(), 3);
    }
}
