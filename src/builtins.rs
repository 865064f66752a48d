//! Builtin steps shipped with the binary.
//!
//! These operate on sequence records: a record is either a bare string or
//! an object carrying a string `sequence` field, and the input is either an
//! array of records or an object with a `records` array. Builtins run
//! in-process and trusted; they never pass through the security analyzer.

use operon_registry::{BuiltinError, BuiltinFn, StepRegistry};
use serde_json::{Map, Value, json};

/// Registry preloaded with every builtin the binary ships.
pub fn default_registry() -> StepRegistry {
  StepRegistry::builder()
    .builtin(BuiltinFn::new("sequence_stats", sequence_stats))
    .builtin(BuiltinFn::new("filter_records", filter_records))
    .build()
}

/// Record count, total and mean sequence length, and GC fraction.
async fn sequence_stats(
  input: Value,
  _parameters: Map<String, Value>,
) -> Result<Value, BuiltinError> {
  let records = records_of(&input)?;

  let mut total_length = 0usize;
  let mut gc = 0usize;
  for record in records {
    let sequence = sequence_of(record)?;
    total_length += sequence.len();
    gc += sequence
      .chars()
      .filter(|c| matches!(c, 'g' | 'G' | 'c' | 'C'))
      .count();
  }

  let count = records.len();
  let mean_length = if count == 0 {
    0.0
  } else {
    total_length as f64 / count as f64
  };
  let gc_fraction = if total_length == 0 {
    0.0
  } else {
    gc as f64 / total_length as f64
  };

  Ok(json!({
    "count": count,
    "total_length": total_length,
    "mean_length": mean_length,
    "gc_fraction": gc_fraction,
  }))
}

/// Keep records whose sequence is at least `min_length` characters long.
async fn filter_records(
  input: Value,
  parameters: Map<String, Value>,
) -> Result<Value, BuiltinError> {
  let min_length = match parameters.get("min_length") {
    Some(value) => value
      .as_u64()
      .ok_or_else(|| BuiltinError::new("min_length must be a non-negative integer"))?
      as usize,
    None => 0,
  };

  let mut kept = Vec::new();
  for record in records_of(&input)? {
    if sequence_of(record)?.len() >= min_length {
      kept.push(record.clone());
    }
  }
  Ok(Value::Array(kept))
}

fn records_of(input: &Value) -> Result<&[Value], BuiltinError> {
  match input {
    Value::Array(records) => Ok(records),
    Value::Object(map) => match map.get("records") {
      Some(Value::Array(records)) => Ok(records),
      _ => Err(BuiltinError::new(
        "expected an array of records or an object with a `records` array",
      )),
    },
    _ => Err(BuiltinError::new(
      "expected an array of records or an object with a `records` array",
    )),
  }
}

fn sequence_of(record: &Value) -> Result<&str, BuiltinError> {
  match record {
    Value::String(sequence) => Ok(sequence),
    Value::Object(map) => map
      .get("sequence")
      .and_then(Value::as_str)
      .ok_or_else(|| BuiltinError::new("record has no string `sequence` field")),
    _ => Err(BuiltinError::new(
      "record must be a string or an object with a `sequence` field",
    )),
  }
}
