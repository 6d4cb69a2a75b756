//! Artifact materialization. Rows live in memory as
//! `serde_json::Map<String, Value>` throughout the evaluator (mirroring
//! `ManualInputSettings`/`PreviewRows` elsewhere in the workspace); this
//! module is the only place that touches disk.
//!
//! No dataframe/parquet/arrow crate is part of this corpus (confirmed
//! against every `Cargo.toml` in the workspace), so artifacts this worker
//! produces itself are a single JSON document — `{"schema": ..., "rows":
//! ...}` — written at the path `Artifact::relative_path` would assign a
//! real parquet/arrow file. Content-addressing, schema, and row counts are
//! therefore faithful; byte-level format fidelity for `Parquet`/`Ipc` is
//! not. `Csv` is written as real, RFC 4180-ish CSV, since that format needs
//! no external crate to produce correctly. See DESIGN.md.
//!
//! `read_csv` and `read_json` parse real on-disk files (these are sources a
//! user points the flow at, not artifacts this worker wrote), so they are
//! real parsers rather than envelope readers.

use crate::error::{Result, WorkerError};
use flowfile_types::{Artifact, ArtifactFormat, ColumnSchema, ColumnType, ContentHash, Digest, Schema};
use flowfile_registry::plan::{ArtifactRef, WriteMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub type Rows = Vec<Map<String, Value>>;

#[derive(Debug, Serialize, Deserialize)]
struct StoredArtifact {
    schema: Schema,
    rows: Rows,
}

/// Schema inference by sampling the first row, matching
/// `flowfile_registry::kinds::input::infer_schema_from_rows`'s policy.
pub fn infer_schema(rows: &[Map<String, Value>]) -> Schema {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .iter()
        .map(|(name, value)| ColumnSchema::new(name.clone(), column_type_of(value)))
        .collect()
}

fn column_type_of(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) => ColumnType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Int64,
        Value::Number(_) => ColumnType::Float64,
        Value::String(_) => ColumnType::Utf8,
        Value::Null => ColumnType::Null,
        Value::Array(_) | Value::Object(_) => ColumnType::Utf8,
    }
}

/// Writes `rows` as a cache artifact under `root`, content-addressed by
/// their serialized bytes, in the envelope described at module level.
pub fn materialize(root: &Path, rows: Rows, schema: Schema, format: ArtifactFormat) -> Result<Artifact> {
    let body = serde_json::to_vec(&StoredArtifact { schema: schema.clone(), rows: rows.clone() })?;
    let content_hash = ContentHash(Digest::of(&body));
    let relative = Artifact::relative_path(content_hash, format);
    let absolute = root.join(&relative);
    if let Some(parent) = absolute.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&absolute, &body)?;
    Ok(Artifact {
        path: relative,
        format,
        schema,
        row_count: rows.len() as u64,
        content_hash,
        byte_size: body.len() as u64,
    })
}

/// Reads back an artifact this worker (or a previous run of it) produced.
pub fn read_artifact(root: &Path, reference: &ArtifactRef) -> Result<(Rows, Schema)> {
    let absolute = root.join(&reference.path);
    let body = std::fs::read(&absolute).map_err(|e| {
        WorkerError::Execution(format!("reading artifact {}: {e}", absolute.display()))
    })?;
    let stored: StoredArtifact = serde_json::from_slice(&body)?;
    Ok((stored.rows, stored.schema))
}

/// Real CSV parsing for `read_csv` sources (spec §4.2 `read_csv`). Handles
/// quoted fields containing the delimiter or embedded newlines; does not
/// attempt dialect sniffing beyond the `delimiter`/`has_header` settings
/// already resolved by the registry.
pub fn read_csv(path: &Path, delimiter: char, has_header: bool, skip_rows: u32) -> Result<(Rows, Schema)> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::Execution(format!("reading {}: {e}", path.display())))?;
    let mut records: Vec<Vec<String>> = Vec::new();
    for line in csv_lines(&text, delimiter) {
        records.push(line);
    }
    let records: Vec<_> = records.into_iter().skip(skip_rows as usize).collect();
    if records.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let (header, data): (Vec<String>, &[Vec<String>]) = if has_header {
        (records[0].clone(), &records[1..])
    } else {
        let width = records[0].len();
        ((0..width).map(|i| format!("column_{i}")).collect(), &records[..])
    };
    let rows: Rows = data
        .iter()
        .map(|record| {
            let mut map = Map::new();
            for (name, raw) in header.iter().zip(record.iter()) {
                map.insert(name.clone(), infer_csv_value(raw));
            }
            map
        })
        .collect();
    let schema = infer_schema(&rows);
    Ok((rows, schema))
}

fn infer_csv_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    Value::String(raw.to_string())
}

/// Minimal RFC 4180 line/field splitter: handles `"`-quoted fields with
/// embedded delimiters, newlines, and doubled-quote escapes.
fn csv_lines(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut lines = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            record.push(std::mem::take(&mut field));
        } else if c == '\n' {
            record.push(std::mem::take(&mut field));
            lines.push(std::mem::take(&mut record));
        } else if c == '\r' {
            // swallow, paired \n handled above
        } else {
            field.push(c);
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        lines.push(record);
    }
    lines.into_iter().filter(|r| !(r.len() == 1 && r[0].is_empty())).collect()
}

fn csv_field(value: &Value) -> String {
    let raw = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

/// Real JSON parsing for `read_json` sources: a top-level array of objects.
pub fn read_json(path: &Path) -> Result<(Rows, Schema)> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::Execution(format!("reading {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&text)?;
    let rows: Rows = match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(WorkerError::Execution(format!(
                    "expected an array of objects, found {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?,
        other => {
            return Err(WorkerError::Execution(format!(
                "expected a top-level JSON array, found {other}"
            )))
        }
    };
    let schema = infer_schema(&rows);
    Ok((rows, schema))
}

/// Writes a sink's (`output` node) rows to the user-named destination
/// (distinct from `materialize`'s content-addressed cache path), honoring
/// `write_mode`. Returns an `Artifact` describing what was written so the
/// worker still has something to put in its `Done` frame, even though
/// sinks have no consumer (spec: output nodes "produce no output schema").
pub fn write_sink(path: &Path, format: ArtifactFormat, write_mode: WriteMode, rows: Rows, schema: Schema) -> Result<Artifact> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if write_mode == WriteMode::NewFile && path.exists() {
        return Err(WorkerError::Execution(format!(
            "{} already exists and write_mode is new_file",
            path.display()
        )));
    }
    let byte_size = match format {
        ArtifactFormat::Csv => write_csv(path, &schema, &rows, write_mode == WriteMode::Append)?,
        ArtifactFormat::Parquet | ArtifactFormat::Ipc => {
            let body = serde_json::to_vec(&StoredArtifact { schema: schema.clone(), rows: rows.clone() })?;
            std::fs::write(path, &body)?;
            body.len() as u64
        }
    };
    let content_hash = ContentHash(Digest::of(path.as_os_str().as_encoded_bytes()));
    Ok(Artifact {
        path: path.to_path_buf(),
        format,
        schema,
        row_count: rows.len() as u64,
        content_hash,
        byte_size,
    })
}

fn write_csv(path: &Path, schema: &Schema, rows: &Rows, append: bool) -> Result<u64> {
    use std::io::Write;
    let write_header = !(append && path.exists());
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(append)
        .write(true)
        .truncate(!append)
        .open(path)?;
    let mut bytes_written = 0u64;
    if write_header {
        let header: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
        let line = format!("{}\n", header.join(","));
        file.write_all(line.as_bytes())?;
        bytes_written += line.len() as u64;
    }
    for row in rows {
        let line: Vec<String> = schema
            .iter()
            .map(|c| csv_field(row.get(&c.name).unwrap_or(&Value::Null)))
            .collect();
        let line = format!("{}\n", line.join(","));
        file.write_all(line.as_bytes())?;
        bytes_written += line.len() as u64;
    }
    Ok(bytes_written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_then_read_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut row = Map::new();
        row.insert("id".into(), Value::from(1));
        let schema = infer_schema(&[row.clone()]);
        let artifact = materialize(dir.path(), vec![row.clone()], schema, ArtifactFormat::Parquet).unwrap();
        let reference = ArtifactRef { path: artifact.path.clone(), format: artifact.format };
        let (rows, _) = read_artifact(dir.path(), &reference).unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn csv_round_trips_through_write_sink_and_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut row = Map::new();
        row.insert("name".into(), Value::from("a, b"));
        row.insert("count".into(), Value::from(3));
        let schema = infer_schema(&[row.clone()]);
        write_sink(&path, ArtifactFormat::Csv, WriteMode::Overwrite, vec![row], schema).unwrap();
        let (rows, _) = read_csv(&path, ',', true, 0).unwrap();
        assert_eq!(rows[0]["name"], Value::from("a, b"));
        assert_eq!(rows[0]["count"], Value::from(3));
    }

    #[test]
    fn csv_append_skips_a_second_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut row = Map::new();
        row.insert("id".into(), Value::from(1));
        let schema = infer_schema(&[row.clone()]);
        write_sink(&path, ArtifactFormat::Csv, WriteMode::Overwrite, vec![row.clone()], schema.clone()).unwrap();
        write_sink(&path, ArtifactFormat::Csv, WriteMode::Append, vec![row], schema).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
