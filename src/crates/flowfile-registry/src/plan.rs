//! The lazy operation description that crosses the server→worker boundary
//! (spec §4.2: "a structured value, not raw code").

use flowfile_types::{ArtifactFormat, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// A resolved reference to an upstream artifact, as seen by the worker:
/// already materialized (or cached), with its path and schema known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub format: ArtifactFormat,
}

/// A name bound to an upstream port for a `polars_code` node. Per spec's
/// Open Question, bound names must match upstream port labels exactly
/// (see DESIGN.md for the adopted policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundInput {
    pub name: String,
    pub port_label: String,
}

/// Sort direction for `sort` and as a per-key modifier for `group_by`
/// ordering-sensitive aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Join strategy (spec §4.2 `join`/`cross_join`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinHow {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

/// Aggregation function for `group_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    Sum,
    Min,
    Max,
    Mean,
    Median,
    Count,
    NUnique,
    First,
    Last,
    Concat,
}

/// Row-keep policy for `unique`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepStrategy {
    First,
    Last,
    Any,
    None,
}

/// Union mode (spec §4.2 `union`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMode {
    Diagonal,
    Relaxed,
}

/// Write mode for output nodes (spec §4.2 `output`, and §9's open question
/// on append semantics — left to the writer, see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Overwrite,
    NewFile,
    Append,
}

/// One group-by aggregation: an output column, the source column, and the
/// function to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub source_column: String,
    pub output_name: String,
    pub func: AggFunc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

/// A column rename/cast/keep directive for `select`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast_to: Option<flowfile_types::ColumnType>,
    pub keep: bool,
}

/// Policy for columns present upstream but not named in a `select`'s list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepMissingPolicy {
    Keep,
    Drop,
}

/// A structured filter predicate: `field operator value[, value2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub operator: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value2: Option<Value>,
}

/// The filter condition: either a structured predicate or a free-form
/// expression string (spec §4.2 `filter`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FilterCondition {
    Structured(FilterPredicate),
    Expression { expr: String },
}

/// The fully-resolved, worker-executable description of a single node's
/// operation. This is what `flowfile-worker-proto` serializes into a
/// `start` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    ManualInput {
        rows: Vec<serde_json::Map<String, Value>>,
    },
    ReadCsv {
        path: PathBuf,
        delimiter: char,
        encoding: String,
        skip_rows: u32,
        has_header: bool,
    },
    ReadParquet {
        path: PathBuf,
    },
    ReadExcel {
        path: PathBuf,
        sheet: String,
        skip_rows: u32,
    },
    ReadJson {
        path: PathBuf,
    },
    CloudStorageReader {
        uri: String,
        connection_ref: String,
        format: ArtifactFormat,
    },
    CloudStorageWriter {
        input: ArtifactRef,
        uri: String,
        connection_ref: String,
        format: ArtifactFormat,
        write_mode: WriteMode,
    },
    DatabaseReader {
        connection_ref: String,
        query: Option<String>,
        schema_table: Option<(String, String)>,
    },
    DatabaseWriter {
        input: ArtifactRef,
        connection_ref: String,
        schema_table: (String, String),
        write_mode: WriteMode,
    },
    Select {
        input: ArtifactRef,
        columns: Vec<SelectColumn>,
        keep_missing: KeepMissingPolicy,
    },
    Filter {
        input: ArtifactRef,
        condition: FilterCondition,
    },
    GroupBy {
        input: ArtifactRef,
        group_keys: Vec<String>,
        aggregations: Vec<Aggregation>,
    },
    Join {
        main: ArtifactRef,
        right: ArtifactRef,
        how: JoinHow,
        on: Vec<(String, String)>,
        suffix: String,
    },
    CrossJoin {
        main: ArtifactRef,
        right: ArtifactRef,
        suffix: String,
    },
    Union {
        inputs: Vec<ArtifactRef>,
        mode: UnionMode,
    },
    Sort {
        input: ArtifactRef,
        keys: Vec<SortKey>,
    },
    Unique {
        input: ArtifactRef,
        subset: Vec<String>,
        keep: KeepStrategy,
    },
    Pivot {
        input: ArtifactRef,
        index: Vec<String>,
        columns: String,
        values: String,
        agg: AggFunc,
    },
    Unpivot {
        input: ArtifactRef,
        index: Vec<String>,
        value_columns: Vec<String>,
        name_to: String,
        value_to: String,
    },
    Head {
        input: ArtifactRef,
        n: u64,
    },
    Sample {
        input: ArtifactRef,
        n: u64,
        seed: Option<u64>,
    },
    RecordId {
        input: ArtifactRef,
        output_name: String,
        start_at: i64,
    },
    Formula {
        input: ArtifactRef,
        output_name: String,
        expr: String,
    },
    PolarsCode {
        inputs: Vec<(String, ArtifactRef)>,
        source: String,
    },
    Output {
        input: ArtifactRef,
        path: PathBuf,
        format: ArtifactFormat,
        write_mode: WriteMode,
    },
}

impl PlanOp {
    /// The kind name this plan was built from, used for logging/metrics tags.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PlanOp::ManualInput { .. } => "manual_input",
            PlanOp::ReadCsv { .. } => "read_csv",
            PlanOp::ReadParquet { .. } => "read_parquet",
            PlanOp::ReadExcel { .. } => "read_excel",
            PlanOp::ReadJson { .. } => "read_json",
            PlanOp::CloudStorageReader { .. } => "cloud_storage_reader",
            PlanOp::CloudStorageWriter { .. } => "cloud_storage_writer",
            PlanOp::DatabaseReader { .. } => "database_reader",
            PlanOp::DatabaseWriter { .. } => "database_writer",
            PlanOp::Select { .. } => "select",
            PlanOp::Filter { .. } => "filter",
            PlanOp::GroupBy { .. } => "group_by",
            PlanOp::Join { .. } => "join",
            PlanOp::CrossJoin { .. } => "cross_join",
            PlanOp::Union { .. } => "union",
            PlanOp::Sort { .. } => "sort",
            PlanOp::Unique { .. } => "unique",
            PlanOp::Pivot { .. } => "pivot",
            PlanOp::Unpivot { .. } => "unpivot",
            PlanOp::Head { .. } => "head",
            PlanOp::Sample { .. } => "sample",
            PlanOp::RecordId { .. } => "record_id",
            PlanOp::Formula { .. } => "formula",
            PlanOp::PolarsCode { .. } => "polars_code",
            PlanOp::Output { .. } => "output",
        }
    }

    /// Also tag with the node kind this originated from, for symmetry with
    /// `NodeKind`-keyed logging elsewhere in the codebase.
    pub fn node_kind(&self) -> NodeKind {
        NodeKind::from(self.kind_name())
    }
}
