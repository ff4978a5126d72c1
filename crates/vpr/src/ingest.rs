//! Input loading: vulnerability batches arrive as JSON files, either a
//! top-level array or an object wrapping the list under a handful of
//! conventional keys.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use vpr_core::model::FindingRecord;

const MAX_INPUT_BYTES: u64 = 512 * 1024 * 1024;
const WRAPPER_KEYS: &[&str] = &["vulnerabilities", "findings", "results", "data"];

/// Load raw finding objects from one JSON file.
pub fn load_file(path: &Path) -> Result<Vec<Value>> {
    let meta =
        fs::metadata(path).with_context(|| format!("reading input {}", path.display()))?;
    if meta.len() > MAX_INPUT_BYTES {
        bail!("input {} exceeds {} bytes", path.display(), MAX_INPUT_BYTES);
    }
    let bytes = fs::read(path).with_context(|| format!("reading input {}", path.display()))?;
    let parsed: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing input {}", path.display()))?;

    let list = match parsed {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let wrapped = WRAPPER_KEYS.iter().find_map(|key| map.remove(*key));
            match wrapped {
                Some(Value::Array(items)) => items,
                Some(other) => bail!(
                    "input {}: expected an array under the wrapper key, got {}",
                    path.display(),
                    type_name(&other),
                ),
                // An object with no known wrapper: treat its values as the
                // list of findings.
                None => map.into_iter().map(|(_, v)| v).collect(),
            }
        }
        other => bail!("input {}: expected array or object, got {}", path.display(), type_name(&other)),
    };

    let mut objects = Vec::with_capacity(list.len());
    let mut skipped = 0usize;
    for item in list {
        if item.is_object() {
            objects.push(item);
        } else {
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "non-object entries ignored");
    }
    info!(records = objects.len(), path = %path.display(), "input loaded");
    Ok(objects)
}

/// Load every input file and resolve the raw objects into typed records.
/// Batch positions are assigned across all files in argument order.
pub fn load_records(paths: &[std::path::PathBuf]) -> Result<Vec<FindingRecord>> {
    let mut raw = Vec::new();
    for path in paths {
        raw.extend(load_file(path)?);
    }
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, value)| FindingRecord::from_json(value, index))
        .collect())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
