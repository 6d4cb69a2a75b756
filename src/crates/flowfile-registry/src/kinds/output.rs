//! Sink kinds: `output`, `cloud_storage_writer`, `database_writer` (spec
//! §4.2). Sinks produce no output schema — they terminate a branch of the
//! graph and write artifacts as a side effect, so `validate` always returns
//! an empty output list.

use crate::descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
use crate::plan::{ArtifactRef, PlanOp, WriteMode};
use crate::schema::{FieldKind, FieldSchema, SettingsSchema};
use flowfile_types::{ArtifactFormat, FlowfileError, Schema, SettingsValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

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
pub struct OutputSettings {
    pub path: PathBuf,
    pub format: ArtifactFormat,
    #[serde(default = "default_write_mode")]
    pub write_mode: WriteMode,
}

fn default_write_mode() -> WriteMode {
    WriteMode::Overwrite
}

pub struct OutputNode;

impl NodeDescriptor for OutputNode {
    fn kind_name(&self) -> &'static str {
        "output"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::sink()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Output
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("path", FieldKind::Text).required(),
            FieldSchema::new("format", FieldKind::SingleSelect).required(),
            FieldSchema::new("write_mode", FieldKind::SingleSelect)
                .with_default(serde_json::json!("overwrite")),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        single_input(inputs, "output")?;
        let _: OutputSettings = parse_settings(settings)?;
        Ok(Vec::new())
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "output")?.clone();
        let parsed: OutputSettings = parse_settings(settings)?;
        Ok(PlanOp::Output {
            input,
            path: parsed.path,
            format: parsed.format,
            write_mode: parsed.write_mode,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudStorageWriterSettings {
    pub uri: String,
    pub connection_ref: String,
    pub format: ArtifactFormat,
    #[serde(default = "default_write_mode")]
    pub write_mode: WriteMode,
}

pub struct CloudStorageWriterNode;

impl NodeDescriptor for CloudStorageWriterNode {
    fn kind_name(&self) -> &'static str {
        "cloud_storage_writer"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::sink()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Output
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("uri", FieldKind::Text).required(),
            FieldSchema::new("connection_ref", FieldKind::SecretRef).required(),
            FieldSchema::new("format", FieldKind::SingleSelect).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        single_input(inputs, "cloud_storage_writer")?;
        let _: CloudStorageWriterSettings = parse_settings(settings)?;
        Ok(Vec::new())
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "cloud_storage_writer")?.clone();
        let parsed: CloudStorageWriterSettings = parse_settings(settings)?;
        Ok(PlanOp::CloudStorageWriter {
            input,
            uri: parsed.uri,
            connection_ref: parsed.connection_ref,
            format: parsed.format,
            write_mode: parsed.write_mode,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseWriterSettings {
    pub connection_ref: String,
    pub schema_table: (String, String),
    #[serde(default = "default_write_mode")]
    pub write_mode: WriteMode,
}

pub struct DatabaseWriterNode;

impl NodeDescriptor for DatabaseWriterNode {
    fn kind_name(&self) -> &'static str {
        "database_writer"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::sink()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Output
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("connection_ref", FieldKind::SecretRef).required(),
            FieldSchema::new("schema_table", FieldKind::Text).required(),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        single_input(inputs, "database_writer")?;
        let _: DatabaseWriterSettings = parse_settings(settings)?;
        Ok(Vec::new())
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        let input = single_artifact(inputs, "database_writer")?.clone();
        let parsed: DatabaseWriterSettings = parse_settings(settings)?;
        Ok(PlanOp::DatabaseWriter {
            input,
            connection_ref: parsed.connection_ref,
            schema_table: parsed.schema_table,
            write_mode: parsed.write_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::{ColumnSchema, ColumnType};

    #[test]
    fn output_produces_no_schema() {
        let settings = SettingsValue::new(serde_json::json!({"path": "/tmp/out.parquet", "format": "parquet"}));
        let schema = vec![ColumnSchema::new("id", ColumnType::Int64)];
        let out = OutputNode.validate(&settings, &[schema]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn output_rejects_zero_inputs() {
        let settings = SettingsValue::new(serde_json::json!({"path": "/tmp/out.parquet", "format": "parquet"}));
        let err = OutputNode.validate(&settings, &[]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }
}
