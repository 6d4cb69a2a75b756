//! Source kinds: `manual_input`, file readers, cloud storage and database
//! readers (spec §4.2).
//!
//! Source nodes have no upstream inputs, so invariant 4 ("a node's derived
//! schema depends only on its settings and the schemas of its connected
//! inputs") reduces to "depends only on settings". File-backed readers
//! therefore carry an explicit `schema_hint`, populated out-of-band by a
//! file-sniffing preview call before the node is marked `is_setup`, rather
//! than inferring the schema from disk inside `validate` — that would make
//! validation perform I/O and violate the "purely functional" requirement
//! of spec §3 invariant 4.

use crate::descriptor::{parse_settings, NodeCategory, NodeDescriptor, NodeShape};
use crate::plan::{ArtifactRef, PlanOp};
use crate::schema::{FieldKind, FieldSchema, SettingsSchema};
use flowfile_types::{ArtifactFormat, ColumnSchema, FlowfileError, Schema, SettingsValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

fn no_inputs_expected(inputs: &[Schema], kind: &str) -> Result<(), FlowfileError> {
    if !inputs.is_empty() {
        return Err(FlowfileError::validation(format!(
            "{kind} is a source node and accepts no inputs, got {}",
            inputs.len()
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ManualInputSettings {
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

pub struct ManualInputNode;

impl NodeDescriptor for ManualInputNode {
    fn kind_name(&self) -> &'static str {
        "manual_input"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("rows", FieldKind::Array).required(),
        ])
    }

    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        no_inputs_expected(inputs, "manual_input")?;
        let parsed: ManualInputSettings = parse_settings(settings)?;
        if !parsed.schema_hint.is_empty() {
            return Ok(vec![parsed.schema_hint]);
        }
        Ok(vec![infer_schema_from_rows(&parsed.rows)])
    }

    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "manual_input accepts no inputs".into(),
            });
        }
        let parsed: ManualInputSettings = parse_settings(settings)?;
        Ok(PlanOp::ManualInput { rows: parsed.rows })
    }
}

fn infer_schema_from_rows(rows: &[Map<String, Value>]) -> Schema {
    use flowfile_types::ColumnType;
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .iter()
        .map(|(name, value)| {
            let dtype = match value {
                Value::Bool(_) => ColumnType::Boolean,
                Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Int64,
                Value::Number(_) => ColumnType::Float64,
                Value::String(_) => ColumnType::Utf8,
                Value::Null => ColumnType::Null,
                Value::Array(_) | Value::Object(_) => ColumnType::Utf8,
            };
            ColumnSchema::new(name.clone(), dtype)
        })
        .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadParquetSettings {
    pub path: PathBuf,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

pub struct ReadParquetNode;

impl NodeDescriptor for ReadParquetNode {
    fn kind_name(&self) -> &'static str {
        "read_parquet"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("path", FieldKind::Text).required()])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        no_inputs_expected(inputs, "read_parquet")?;
        let parsed: ReadParquetSettings = parse_settings(settings)?;
        if parsed.schema_hint.is_empty() {
            return Err(FlowfileError::validation(
                "read_parquet requires a schema preview before it can be run; none is cached",
            ));
        }
        Ok(vec![parsed.schema_hint])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "read_parquet accepts no inputs".into(),
            });
        }
        let parsed: ReadParquetSettings = parse_settings(settings)?;
        Ok(PlanOp::ReadParquet { path: parsed.path })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadJsonSettings {
    pub path: PathBuf,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

pub struct ReadJsonNode;

impl NodeDescriptor for ReadJsonNode {
    fn kind_name(&self) -> &'static str {
        "read_json"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![FieldSchema::new("path", FieldKind::Text).required()])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        no_inputs_expected(inputs, "read_json")?;
        let parsed: ReadJsonSettings = parse_settings(settings)?;
        if parsed.schema_hint.is_empty() {
            return Err(FlowfileError::validation(
                "read_json requires a schema preview before it can be run; none is cached",
            ));
        }
        Ok(vec![parsed.schema_hint])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "read_json accepts no inputs".into(),
            });
        }
        let parsed: ReadJsonSettings = parse_settings(settings)?;
        Ok(PlanOp::ReadJson { path: parsed.path })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadCsvSettings {
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub skip_rows: u32,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

fn default_delimiter() -> char {
    ','
}
fn default_encoding() -> String {
    "utf-8".to_string()
}
fn default_true() -> bool {
    true
}

pub struct ReadCsvNode;

impl NodeDescriptor for ReadCsvNode {
    fn kind_name(&self) -> &'static str {
        "read_csv"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("path", FieldKind::Text).required(),
            FieldSchema::new("delimiter", FieldKind::Text).with_default(Value::String(",".into())),
            FieldSchema::new("encoding", FieldKind::SingleSelect)
                .with_default(Value::String("utf-8".into())),
            FieldSchema::new("skip_rows", FieldKind::Numeric).with_default(Value::from(0)),
            FieldSchema::new("has_header", FieldKind::Bool).with_default(Value::Bool(true)),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        no_inputs_expected(inputs, "read_csv")?;
        let parsed: ReadCsvSettings = parse_settings(settings)?;
        if parsed.schema_hint.is_empty() {
            return Err(FlowfileError::validation(
                "read_csv requires a schema preview before it can be run; none is cached",
            ));
        }
        Ok(vec![parsed.schema_hint])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "read_csv accepts no inputs".into(),
            });
        }
        let parsed: ReadCsvSettings = parse_settings(settings)?;
        Ok(PlanOp::ReadCsv {
            path: parsed.path,
            delimiter: parsed.delimiter,
            encoding: parsed.encoding,
            skip_rows: parsed.skip_rows,
            has_header: parsed.has_header,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadExcelSettings {
    pub path: PathBuf,
    pub sheet: String,
    #[serde(default)]
    pub skip_rows: u32,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

pub struct ReadExcelNode;

impl NodeDescriptor for ReadExcelNode {
    fn kind_name(&self) -> &'static str {
        "read_excel"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("path", FieldKind::Text).required(),
            FieldSchema::new("sheet", FieldKind::Text).required(),
            FieldSchema::new("skip_rows", FieldKind::Numeric).with_default(Value::from(0)),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        no_inputs_expected(inputs, "read_excel")?;
        let parsed: ReadExcelSettings = parse_settings(settings)?;
        if parsed.schema_hint.is_empty() {
            return Err(FlowfileError::validation(
                "read_excel requires a schema preview before it can be run; none is cached",
            ));
        }
        Ok(vec![parsed.schema_hint])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "read_excel accepts no inputs".into(),
            });
        }
        let parsed: ReadExcelSettings = parse_settings(settings)?;
        Ok(PlanOp::ReadExcel {
            path: parsed.path,
            sheet: parsed.sheet,
            skip_rows: parsed.skip_rows,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudStorageReaderSettings {
    pub uri: String,
    pub connection_ref: String,
    pub format: ArtifactFormat,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

pub struct CloudStorageReaderNode;

impl NodeDescriptor for CloudStorageReaderNode {
    fn kind_name(&self) -> &'static str {
        "cloud_storage_reader"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
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
        no_inputs_expected(inputs, "cloud_storage_reader")?;
        let parsed: CloudStorageReaderSettings = parse_settings(settings)?;
        if parsed.schema_hint.is_empty() {
            return Err(FlowfileError::validation(
                "cloud_storage_reader requires a schema preview before it can be run",
            ));
        }
        Ok(vec![parsed.schema_hint])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "cloud_storage_reader accepts no inputs".into(),
            });
        }
        let parsed: CloudStorageReaderSettings = parse_settings(settings)?;
        Ok(PlanOp::CloudStorageReader {
            uri: parsed.uri,
            connection_ref: parsed.connection_ref,
            format: parsed.format,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseReaderSettings {
    pub connection_ref: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub schema_table: Option<(String, String)>,
    #[serde(default)]
    pub schema_hint: Vec<ColumnSchema>,
}

pub struct DatabaseReaderNode;

impl NodeDescriptor for DatabaseReaderNode {
    fn kind_name(&self) -> &'static str {
        "database_reader"
    }
    fn shape(&self) -> NodeShape {
        NodeShape::source()
    }
    fn category(&self) -> NodeCategory {
        NodeCategory::Input
    }
    fn settings_schema(&self) -> SettingsSchema {
        SettingsSchema::new(vec![
            FieldSchema::new("connection_ref", FieldKind::SecretRef).required(),
            FieldSchema::new("query", FieldKind::Text),
        ])
    }
    fn validate(
        &self,
        settings: &SettingsValue,
        inputs: &[Schema],
    ) -> Result<Vec<Schema>, FlowfileError> {
        no_inputs_expected(inputs, "database_reader")?;
        let parsed: DatabaseReaderSettings = parse_settings(settings)?;
        if parsed.query.is_none() && parsed.schema_table.is_none() {
            return Err(FlowfileError::validation(
                "database_reader requires either a query or a (schema, table) pair",
            ));
        }
        if parsed.schema_hint.is_empty() {
            return Err(FlowfileError::validation(
                "database_reader requires a schema preview before it can be run",
            ));
        }
        Ok(vec![parsed.schema_hint])
    }
    fn build_plan(
        &self,
        settings: &SettingsValue,
        inputs: &[ArtifactRef],
    ) -> Result<PlanOp, FlowfileError> {
        if !inputs.is_empty() {
            return Err(FlowfileError::PlanInvalid {
                message: "database_reader accepts no inputs".into(),
            });
        }
        let parsed: DatabaseReaderSettings = parse_settings(settings)?;
        Ok(PlanOp::DatabaseReader {
            connection_ref: parsed.connection_ref,
            query: parsed.query,
            schema_table: parsed.schema_table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_input_infers_schema_from_first_row() {
        let mut row = Map::new();
        row.insert("id".into(), Value::from(1));
        row.insert("name".into(), Value::String("A".into()));
        let settings = SettingsValue::new(serde_json::json!({"rows": [row]}));
        let schema = ManualInputNode.validate(&settings, &[]).unwrap();
        assert_eq!(schema[0].len(), 2);
    }

    #[test]
    fn manual_input_rejects_connected_inputs() {
        let settings = SettingsValue::new(serde_json::json!({"rows": []}));
        let err = ManualInputNode.validate(&settings, &[Vec::new()]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[test]
    fn read_csv_without_schema_hint_fails_validation() {
        let settings = SettingsValue::new(serde_json::json!({"path": "/tmp/x.csv"}));
        let err = ReadCsvNode.validate(&settings, &[]).unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }
}
