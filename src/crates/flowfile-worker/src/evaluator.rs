//! Executes a single `PlanOp` against on-disk artifacts (spec §4.2, §4.3).
//!
//! There is no dataframe engine in this corpus's dependency stack, so
//! operations run directly over `Vec<serde_json::Map<String, Value>>` rows
//! — the same row shape `ManualInputSettings` and `PreviewRows` already use
//! elsewhere in the workspace. This covers every `PlanOp` variant's
//! *semantics* faithfully; it is not a vectorized columnar engine. See
//! DESIGN.md for the scope note.

use crate::error::{Result, WorkerError};
use crate::store::{self, Rows};
use flowfile_registry::plan::{
    AggFunc, ArtifactRef, FilterCondition, JoinHow, KeepMissingPolicy, KeepStrategy, PlanOp,
    SortDirection, UnionMode,
};
use flowfile_types::{ColumnSchema, ColumnType, Schema};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Ambient state the evaluator needs beyond the plan itself: where to read
/// already-materialized artifacts from, a row cap for the memory budget
/// (spec §4.3), and a cancellation point to check between operations
/// (there's only ever one operation per plan, so the only suspension point
/// is before it begins).
pub struct EvalContext<'a> {
    pub artifact_root: &'a Path,
    pub max_rows: u64,
    pub sample_rows: Option<u64>,
    pub cancel: &'a CancellationToken,
}

/// The result of evaluating a plan: rows plus schema, ready for
/// `store::materialize`, or — for `Output` — already written as a side
/// effect with its own returned `Artifact` built directly by the caller.
#[derive(Debug)]
pub struct EvalOutput {
    pub rows: Rows,
    pub schema: Schema,
}

fn check_cancelled(ctx: &EvalContext) -> Result<()> {
    if ctx.cancel.is_cancelled() {
        return Err(WorkerError::Cancelled);
    }
    Ok(())
}

fn enforce_budget(ctx: &EvalContext, rows: &Rows) -> Result<()> {
    if rows.len() as u64 > ctx.max_rows {
        return Err(WorkerError::Execution(format!(
            "result has {} rows, exceeding the {}-row per-task budget",
            rows.len(),
            ctx.max_rows
        )));
    }
    Ok(())
}

fn load(ctx: &EvalContext, reference: &ArtifactRef) -> Result<(Rows, Schema)> {
    store::read_artifact(ctx.artifact_root, reference)
}

fn sample(ctx: &EvalContext, mut rows: Rows) -> Rows {
    if let Some(cap) = ctx.sample_rows {
        rows.truncate(cap as usize);
    }
    rows
}

pub fn evaluate(plan: &PlanOp, ctx: &EvalContext) -> Result<EvalOutput> {
    check_cancelled(ctx)?;
    let output = match plan {
        PlanOp::ManualInput { rows } => {
            let rows = sample(ctx, rows.clone());
            let schema = store::infer_schema(&rows);
            EvalOutput { rows, schema }
        }
        PlanOp::ReadCsv { path, delimiter, has_header, skip_rows, .. } => {
            let (rows, schema) = store::read_csv(path, *delimiter, *has_header, *skip_rows)?;
            EvalOutput { rows: sample(ctx, rows), schema }
        }
        PlanOp::ReadJson { path } => {
            let (rows, schema) = store::read_json(path)?;
            EvalOutput { rows: sample(ctx, rows), schema }
        }
        PlanOp::ReadParquet { .. } | PlanOp::ReadExcel { .. } => {
            return Err(WorkerError::Execution(format!(
                "{} reading requires a dataframe engine not present in this build",
                plan.kind_name()
            )));
        }
        PlanOp::CloudStorageReader { .. }
        | PlanOp::CloudStorageWriter { .. }
        | PlanOp::DatabaseReader { .. }
        | PlanOp::DatabaseWriter { .. }
        | PlanOp::PolarsCode { .. } => {
            return Err(WorkerError::Execution(format!(
                "{} is not supported by this worker build",
                plan.kind_name()
            )));
        }
        PlanOp::Select { input, columns, keep_missing } => {
            let (rows, schema) = load(ctx, input)?;
            eval_select(rows, &schema, columns, *keep_missing)?
        }
        PlanOp::Filter { input, condition } => {
            let (rows, schema) = load(ctx, input)?;
            let rows = eval_filter(rows, condition)?;
            EvalOutput { rows, schema }
        }
        PlanOp::GroupBy { input, group_keys, aggregations } => {
            let (rows, _) = load(ctx, input)?;
            eval_group_by(rows, group_keys, aggregations)
        }
        PlanOp::Join { main, right, how, on, suffix } => {
            let (main_rows, main_schema) = load(ctx, main)?;
            let (right_rows, right_schema) = load(ctx, right)?;
            eval_join(main_rows, &main_schema, right_rows, &right_schema, *how, on, suffix)
        }
        PlanOp::CrossJoin { main, right, suffix } => {
            let (main_rows, main_schema) = load(ctx, main)?;
            let (right_rows, right_schema) = load(ctx, right)?;
            eval_cross_join(main_rows, &main_schema, right_rows, &right_schema, suffix)
        }
        PlanOp::Union { inputs, mode } => eval_union(ctx, inputs, *mode)?,
        PlanOp::Sort { input, keys } => {
            let (mut rows, schema) = load(ctx, input)?;
            sort_rows(&mut rows, keys);
            EvalOutput { rows, schema }
        }
        PlanOp::Unique { input, subset, keep } => {
            let (rows, schema) = load(ctx, input)?;
            let rows = eval_unique(rows, subset, *keep);
            EvalOutput { rows, schema }
        }
        PlanOp::Pivot { input, index, columns, values, agg } => {
            let (rows, _) = load(ctx, input)?;
            eval_pivot(rows, index, columns, values, *agg)
        }
        PlanOp::Unpivot { input, index, value_columns, name_to, value_to } => {
            let (rows, _) = load(ctx, input)?;
            eval_unpivot(rows, index, value_columns, name_to, value_to)
        }
        PlanOp::Head { input, n } => {
            let (mut rows, schema) = load(ctx, input)?;
            rows.truncate(*n as usize);
            EvalOutput { rows, schema }
        }
        PlanOp::Sample { input, n, seed } => {
            let (rows, schema) = load(ctx, input)?;
            EvalOutput { rows: eval_sample(rows, *n, *seed), schema }
        }
        PlanOp::RecordId { input, output_name, start_at } => {
            let (rows, mut schema) = load(ctx, input)?;
            let rows = eval_record_id(rows, output_name, *start_at);
            schema.insert(0, ColumnSchema::new(output_name.clone(), ColumnType::Int64).not_null());
            EvalOutput { rows, schema }
        }
        PlanOp::Formula { input, output_name, expr } => {
            let (rows, mut schema) = load(ctx, input)?;
            let rows = eval_formula(rows, output_name, expr)?;
            if !schema.iter().any(|c| c.name == *output_name) {
                schema.push(ColumnSchema::new(output_name.clone(), ColumnType::Utf8));
            }
            EvalOutput { rows, schema }
        }
        PlanOp::Output { input, .. } => {
            // The `Done` artifact for an output sink describes what was
            // *written*, built by `session::run_task` after calling
            // `store::write_sink` directly; here we only need the input
            // rows to hand back up.
            let (rows, schema) = load(ctx, input)?;
            EvalOutput { rows, schema }
        }
    };
    enforce_budget(ctx, &output.rows)?;
    Ok(output)
}

fn eval_select(
    rows: Rows,
    schema: &Schema,
    columns: &[flowfile_registry::plan::SelectColumn],
    keep_missing: KeepMissingPolicy,
) -> Result<EvalOutput> {
    let named: std::collections::HashSet<&str> = columns.iter().map(|c| c.source.as_str()).collect();
    let mut out_schema = Vec::new();
    for col in columns.iter().filter(|c| c.keep) {
        let dtype = schema
            .iter()
            .find(|c| c.name == col.source)
            .map(|c| c.dtype.clone())
            .unwrap_or(ColumnType::Utf8);
        out_schema.push(ColumnSchema::new(col.rename.clone().unwrap_or_else(|| col.source.clone()), dtype));
    }
    if keep_missing == KeepMissingPolicy::Keep {
        for col in schema {
            if !named.contains(col.name.as_str()) {
                out_schema.push(col.clone());
            }
        }
    }
    let out_rows = rows
        .into_iter()
        .map(|row| {
            let mut out = Map::new();
            for col in columns.iter().filter(|c| c.keep) {
                let value = row.get(&col.source).cloned().unwrap_or(Value::Null);
                out.insert(col.rename.clone().unwrap_or_else(|| col.source.clone()), value);
            }
            if keep_missing == KeepMissingPolicy::Keep {
                for (name, value) in &row {
                    if !named.contains(name.as_str()) {
                        out.insert(name.clone(), value.clone());
                    }
                }
            }
            out
        })
        .collect();
    Ok(EvalOutput { rows: out_rows, schema: out_schema })
}

fn eval_filter(rows: Rows, condition: &FilterCondition) -> Result<Rows> {
    match condition {
        FilterCondition::Structured(predicate) => rows
            .into_iter()
            .filter(|row| {
                let field = row.get(&predicate.field).unwrap_or(&Value::Null);
                matches_predicate(field, &predicate.operator, &predicate.value, predicate.value2.as_ref())
            })
            .map(Ok)
            .collect(),
        FilterCondition::Expression { expr } => Err(WorkerError::Execution(format!(
            "free-form filter expressions ({expr:?}) require an embedded expression engine not present in this build"
        ))),
    }
}

fn matches_predicate(field: &Value, operator: &str, value: &Value, value2: Option<&Value>) -> bool {
    match operator {
        "eq" => field == value,
        "ne" => field != value,
        "gt" => compare_values(field, value) == Some(Ordering::Greater),
        "gte" => matches!(compare_values(field, value), Some(Ordering::Greater | Ordering::Equal)),
        "lt" => compare_values(field, value) == Some(Ordering::Less),
        "lte" => matches!(compare_values(field, value), Some(Ordering::Less | Ordering::Equal)),
        "between" => value2.map_or(false, |hi| {
            matches!(compare_values(field, value), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare_values(field, hi), Some(Ordering::Less | Ordering::Equal))
        }),
        "contains" => match (field, value) {
            (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
            _ => false,
        },
        "is_null" => field.is_null(),
        "is_not_null" => !field.is_null(),
        _ => false,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn eval_group_by(rows: Rows, group_keys: &[String], aggregations: &[flowfile_registry::plan::Aggregation]) -> EvalOutput {
    use std::collections::BTreeMap;
    let mut groups: BTreeMap<Vec<String>, Vec<Map<String, Value>>> = BTreeMap::new();
    for row in rows {
        let key: Vec<String> = group_keys.iter().map(|k| value_sort_key(row.get(k).unwrap_or(&Value::Null))).collect();
        groups.entry(key).or_default().push(row);
    }
    let mut out_rows = Vec::new();
    for (_, members) in groups {
        let mut out = Map::new();
        for key in group_keys {
            out.insert(key.clone(), members[0].get(key).cloned().unwrap_or(Value::Null));
        }
        for agg in aggregations {
            let values: Vec<&Value> = members.iter().map(|m| m.get(&agg.source_column).unwrap_or(&Value::Null)).collect();
            out.insert(agg.output_name.clone(), apply_agg(agg.func, &values));
        }
        out_rows.push(out);
    }
    let mut schema: Schema = group_keys.iter().map(|k| ColumnSchema::new(k.clone(), ColumnType::Utf8)).collect();
    for agg in aggregations {
        let dtype = if agg.func == AggFunc::Count || agg.func == AggFunc::NUnique { ColumnType::Int64 } else { ColumnType::Float64 };
        schema.push(ColumnSchema::new(agg.output_name.clone(), dtype));
    }
    EvalOutput { rows: out_rows, schema }
}

fn apply_agg(func: AggFunc, values: &[&Value]) -> Value {
    let numeric: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    match func {
        AggFunc::Count => Value::from(values.len() as i64),
        AggFunc::NUnique => {
            let unique: std::collections::HashSet<String> = values.iter().map(|v| v.to_string()).collect();
            Value::from(unique.len() as i64)
        }
        AggFunc::Sum => Value::from(numeric.iter().sum::<f64>()),
        AggFunc::Mean => {
            if numeric.is_empty() { Value::Null } else { Value::from(numeric.iter().sum::<f64>() / numeric.len() as f64) }
        }
        AggFunc::Min => numeric.iter().cloned().fold(f64::INFINITY, f64::min).into(),
        AggFunc::Max => numeric.iter().cloned().fold(f64::NEG_INFINITY, f64::max).into(),
        AggFunc::Median => {
            let mut sorted = numeric.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            match sorted.len() {
                0 => Value::Null,
                n if n % 2 == 1 => Value::from(sorted[n / 2]),
                n => Value::from((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
            }
        }
        AggFunc::First => values.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
        AggFunc::Last => values.last().map(|v| (*v).clone()).unwrap_or(Value::Null),
        AggFunc::Concat => Value::String(values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")),
    }
}

fn value_sort_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn eval_join(main: Rows, main_schema: &Schema, right: Rows, right_schema: &Schema, how: JoinHow, on: &[(String, String)], suffix: &str) -> EvalOutput {
    let mut out_rows = Vec::new();
    let mut right_matched = vec![false; right.len()];
    for left_row in &main {
        let mut matched_any = false;
        for (ri, right_row) in right.iter().enumerate() {
            if on.iter().all(|(l, r)| left_row.get(l) == right_row.get(r)) {
                matched_any = true;
                right_matched[ri] = true;
                if matches!(how, JoinHow::Semi | JoinHow::Anti) {
                    continue;
                }
                out_rows.push(merge_join_row(left_row, right_row, right_schema, suffix));
            }
        }
        match how {
            JoinHow::Semi if matched_any => out_rows.push(left_row.clone()),
            JoinHow::Anti if !matched_any => out_rows.push(left_row.clone()),
            JoinHow::Left | JoinHow::Full if !matched_any => {
                out_rows.push(merge_join_row(left_row, &Map::new(), right_schema, suffix));
            }
            _ => {}
        }
    }
    if matches!(how, JoinHow::Right | JoinHow::Full) {
        for (ri, right_row) in right.iter().enumerate() {
            if !right_matched[ri] {
                out_rows.push(merge_join_row(&Map::new(), right_row, right_schema, suffix));
            }
        }
    }
    let mut schema = main_schema.clone();
    if !matches!(how, JoinHow::Semi | JoinHow::Anti) {
        let left_names: std::collections::HashSet<&str> = main_schema.iter().map(|c| c.name.as_str()).collect();
        for col in right_schema {
            if left_names.contains(col.name.as_str()) {
                schema.push(ColumnSchema::new(format!("{}{}", col.name, suffix), col.dtype.clone()));
            } else {
                schema.push(col.clone());
            }
        }
    }
    EvalOutput { rows: out_rows, schema }
}

fn merge_join_row(left: &Map<String, Value>, right: &Map<String, Value>, right_schema: &Schema, suffix: &str) -> Map<String, Value> {
    let mut out = left.clone();
    let left_names: std::collections::HashSet<String> = left.keys().cloned().collect();
    for col in right_schema {
        let value = right.get(&col.name).cloned().unwrap_or(Value::Null);
        if left_names.contains(&col.name) {
            out.insert(format!("{}{}", col.name, suffix), value);
        } else {
            out.insert(col.name.clone(), value);
        }
    }
    out
}

fn eval_cross_join(main: Rows, main_schema: &Schema, right: Rows, right_schema: &Schema, suffix: &str) -> EvalOutput {
    let mut out_rows = Vec::with_capacity(main.len() * right.len());
    for left_row in &main {
        for right_row in &right {
            out_rows.push(merge_join_row(left_row, right_row, right_schema, suffix));
        }
    }
    let left_names: std::collections::HashSet<&str> = main_schema.iter().map(|c| c.name.as_str()).collect();
    let mut schema = main_schema.clone();
    for col in right_schema {
        if left_names.contains(col.name.as_str()) {
            schema.push(ColumnSchema::new(format!("{}{}", col.name, suffix), col.dtype.clone()));
        } else {
            schema.push(col.clone());
        }
    }
    EvalOutput { rows: out_rows, schema }
}

fn eval_union(ctx: &EvalContext, inputs: &[ArtifactRef], mode: UnionMode) -> Result<EvalOutput> {
    let mut rows = Vec::new();
    let mut schema: Schema = Vec::new();
    for reference in inputs {
        let (part_rows, part_schema) = load(ctx, reference)?;
        if schema.is_empty() {
            schema = part_schema;
        } else if mode == UnionMode::Diagonal && schema != part_schema {
            return Err(WorkerError::PlanInvalid(
                "diagonal union requires all inputs to share an identical schema".into(),
            ));
        }
        rows.extend(part_rows);
    }
    Ok(EvalOutput { rows, schema })
}

fn sort_rows(rows: &mut Rows, keys: &[flowfile_registry::plan::SortKey]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let ordering = compare_values(a.get(&key.column).unwrap_or(&Value::Null), b.get(&key.column).unwrap_or(&Value::Null))
                .unwrap_or(Ordering::Equal);
            let ordering = if key.direction == SortDirection::Descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn eval_unique(rows: Rows, subset: &[String], keep: KeepStrategy) -> Rows {
    if keep == KeepStrategy::None {
        let mut counts: std::collections::HashMap<Vec<String>, usize> = std::collections::HashMap::new();
        for row in &rows {
            *counts.entry(unique_key(row, subset)).or_default() += 1;
        }
        return rows.into_iter().filter(|row| counts[&unique_key(row, subset)] == 1).collect();
    }
    let mut seen = std::collections::HashSet::new();
    let ordered: Box<dyn Iterator<Item = Map<String, Value>>> = if keep == KeepStrategy::Last {
        Box::new(rows.into_iter().rev())
    } else {
        Box::new(rows.into_iter())
    };
    let mut kept: Vec<_> = ordered.filter(|row| seen.insert(unique_key(row, subset))).collect();
    if keep == KeepStrategy::Last {
        kept.reverse();
    }
    kept
}

fn unique_key(row: &Map<String, Value>, subset: &[String]) -> Vec<String> {
    if subset.is_empty() {
        row.iter().map(|(k, v)| format!("{k}={v}")).collect()
    } else {
        subset.iter().map(|k| value_sort_key(row.get(k).unwrap_or(&Value::Null))).collect()
    }
}

fn eval_pivot(rows: Rows, index: &[String], columns: &str, values: &str, agg: AggFunc) -> EvalOutput {
    use std::collections::BTreeMap;
    let mut groups: BTreeMap<Vec<String>, BTreeMap<String, Vec<&Value>>> = BTreeMap::new();
    for row in &rows {
        let key: Vec<String> = index.iter().map(|c| value_sort_key(row.get(c).unwrap_or(&Value::Null))).collect();
        let column_value = value_sort_key(row.get(columns).unwrap_or(&Value::Null));
        groups.entry(key).or_default().entry(column_value).or_default().push(row.get(values).unwrap_or(&Value::Null));
    }
    let mut column_names: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for row in &rows {
        column_names.insert(value_sort_key(row.get(columns).unwrap_or(&Value::Null)));
    }
    let mut out_rows = Vec::new();
    for (key, by_column) in groups {
        let mut out = Map::new();
        for (name, value) in index.iter().zip(key.iter()) {
            out.insert(name.clone(), Value::String(value.clone()));
        }
        for column_name in &column_names {
            let value = by_column.get(column_name).map(|vs| apply_agg(agg, vs)).unwrap_or(Value::Null);
            out.insert(column_name.clone(), value);
        }
        out_rows.push(out);
    }
    let mut schema: Schema = index.iter().map(|c| ColumnSchema::new(c.clone(), ColumnType::Utf8)).collect();
    for column_name in &column_names {
        schema.push(ColumnSchema::new(column_name.clone(), ColumnType::Float64));
    }
    EvalOutput { rows: out_rows, schema }
}

fn eval_unpivot(rows: Rows, index: &[String], value_columns: &[String], name_to: &str, value_to: &str) -> EvalOutput {
    let mut out_rows = Vec::new();
    for row in &rows {
        for column in value_columns {
            let mut out = Map::new();
            for key in index {
                out.insert(key.clone(), row.get(key).cloned().unwrap_or(Value::Null));
            }
            out.insert(name_to.to_string(), Value::String(column.clone()));
            out.insert(value_to.to_string(), row.get(column).cloned().unwrap_or(Value::Null));
            out_rows.push(out);
        }
    }
    let mut schema: Schema = index.iter().map(|c| ColumnSchema::new(c.clone(), ColumnType::Utf8)).collect();
    schema.push(ColumnSchema::new(name_to.to_string(), ColumnType::Utf8));
    schema.push(ColumnSchema::new(value_to.to_string(), ColumnType::Utf8));
    EvalOutput { rows: out_rows, schema }
}

fn eval_sample(rows: Rows, n: u64, seed: Option<u64>) -> Rows {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    let mut rows = rows;
    match seed {
        Some(seed) => {
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            rows.shuffle(&mut rng);
        }
        None => {
            let mut rng = rand::thread_rng();
            rows.shuffle(&mut rng);
        }
    }
    rows.truncate(n as usize);
    rows
}

fn eval_record_id(rows: Rows, output_name: &str, start_at: i64) -> Rows {
    rows.into_iter()
        .enumerate()
        .map(|(i, mut row)| {
            row.insert(output_name.to_string(), Value::from(start_at + i as i64));
            let mut ordered = Map::new();
            ordered.insert(output_name.to_string(), row.remove(output_name).unwrap());
            ordered.extend(row);
            ordered
        })
        .collect()
}

/// Supports a small, named set of scalar expressions over existing columns
/// (spec §4.2 `formula`'s free-form expression is out of scope without an
/// embedded expression engine — see DESIGN.md); anything else is a clean
/// `PlanInvalid` rather than a silent no-op.
fn eval_formula(rows: Rows, output_name: &str, expr: &str) -> Result<Rows> {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix("concat(").and_then(|s| s.strip_suffix(')')) {
        let columns: Vec<&str> = rest.split(',').map(|s| s.trim()).collect();
        return Ok(rows
            .into_iter()
            .map(|mut row| {
                let joined = columns.iter().map(|c| row.get(*c).map(value_sort_key).unwrap_or_default()).collect::<Vec<_>>().join("");
                row.insert(output_name.to_string(), Value::String(joined));
                row
            })
            .collect());
    }
    if let Some((a, b)) = expr.split_once('+') {
        let (a, b) = (a.trim(), b.trim());
        return Ok(rows
            .into_iter()
            .map(|mut row| {
                let lhs = numeric_operand(&row, a);
                let rhs = numeric_operand(&row, b);
                row.insert(output_name.to_string(), Value::from(lhs + rhs));
                row
            })
            .collect());
    }
    Err(WorkerError::PlanInvalid(format!(
        "unsupported formula expression {expr:?}; this build understands `concat(a, b, ...)` and `a + b`"
    )))
}

fn numeric_operand(row: &Map<String, Value>, token: &str) -> f64 {
    if let Ok(n) = token.parse::<f64>() {
        return n;
    }
    row.get(token).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::ArtifactFormat;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn ctx<'a>(root: &'a Path, cancel: &'a CancellationToken) -> EvalContext<'a> {
        EvalContext { artifact_root: root, max_rows: 1000, sample_rows: None, cancel }
    }

    #[test]
    fn manual_input_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let rows = vec![row(&[("id", Value::from(1))])];
        let plan = PlanOp::ManualInput { rows: rows.clone() };
        let out = evaluate(&plan, &ctx(dir.path(), &cancel)).unwrap();
        assert_eq!(out.rows, rows);
    }

    #[test]
    fn head_truncates_to_n_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let rows = vec![row(&[("id", Value::from(1))]), row(&[("id", Value::from(2))])];
        let schema = store::infer_schema(&rows);
        let artifact = store::materialize(dir.path(), rows, schema, ArtifactFormat::Parquet).unwrap();
        let reference = ArtifactRef { path: artifact.path, format: artifact.format };
        let plan = PlanOp::Head { input: reference, n: 1 };
        let out = evaluate(&plan, &ctx(dir.path(), &cancel)).unwrap();
        assert_eq!(out.rows.len(), 1);
    }

    #[test]
    fn filter_gt_keeps_matching_rows() {
        let rows = vec![row(&[("age", Value::from(10))]), row(&[("age", Value::from(20))])];
        let condition = FilterCondition::Structured(flowfile_registry::plan::FilterPredicate {
            field: "age".into(),
            operator: "gt".into(),
            value: Value::from(15),
            value2: None,
        });
        let out = eval_filter(rows, &condition).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["age"], Value::from(20));
    }

    #[test]
    fn group_by_sums_per_key() {
        let rows = vec![
            row(&[("team", Value::from("a")), ("points", Value::from(3))]),
            row(&[("team", Value::from("a")), ("points", Value::from(4))]),
            row(&[("team", Value::from("b")), ("points", Value::from(1))]),
        ];
        let aggregations = vec![flowfile_registry::plan::Aggregation {
            source_column: "points".into(),
            output_name: "total".into(),
            func: AggFunc::Sum,
        }];
        let out = eval_group_by(rows, &["team".to_string()], &aggregations);
        assert_eq!(out.rows.len(), 2);
        let team_a = out.rows.iter().find(|r| r["team"] == Value::from("a")).unwrap();
        assert_eq!(team_a["total"], Value::from(7.0));
    }

    #[test]
    fn inner_join_matches_on_key() {
        let main = vec![row(&[("id", Value::from(1)), ("name", Value::from("x"))])];
        let right = vec![row(&[("id", Value::from(1)), ("score", Value::from(9))])];
        let main_schema = store::infer_schema(&main);
        let right_schema = store::infer_schema(&right);
        let out = eval_join(main, &main_schema, right, &right_schema, JoinHow::Inner, &[("id".into(), "id".into())], "_r");
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0]["score"], Value::from(9));
    }

    #[test]
    fn unique_keep_first_drops_later_duplicates() {
        let rows = vec![row(&[("id", Value::from(1))]), row(&[("id", Value::from(1))]), row(&[("id", Value::from(2))])];
        let out = eval_unique(rows, &["id".to_string()], KeepStrategy::First);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn formula_sum_of_two_columns() {
        let rows = vec![row(&[("a", Value::from(1)), ("b", Value::from(2))])];
        let out = eval_formula(rows, "c", "a + b").unwrap();
        assert_eq!(out[0]["c"], Value::from(3.0));
    }

    #[test]
    fn budget_rejects_oversized_results() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let rows: Vec<_> = (0..5).map(|i| row(&[("id", Value::from(i))])).collect();
        let mut small_ctx = ctx(dir.path(), &cancel);
        small_ctx.max_rows = 2;
        let plan = PlanOp::ManualInput { rows };
        let err = evaluate(&plan, &small_ctx).unwrap_err();
        assert!(matches!(err, WorkerError::Execution(_)));
    }
}
