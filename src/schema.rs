//! Record shape inference.
//!
//! A record's shape is its flattened `path -> type` map rendered as a compact
//! JSON object with sorted keys, e.g. `{"actor.id":"number","tags[0]":"string"}`.
//! Records differing only in values share a shape; any change in field set,
//! array length or leaf type gives a new one.

use crate::aggregate::Aggregator;
use crate::models::RawRecord;
use crossbeam_channel::Receiver;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

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

fn flatten(path: &str, value: &Value, out: &mut BTreeMap<String, &'static str>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                if path.is_empty() {
                    flatten(key, child, out);
                } else {
                    flatten(&format!("{path}.{key}"), child, out);
                }
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                flatten(&format!("{path}[{i}]"), child, out);
            }
        }
        // empty containers keep their own type as a leaf
        leaf => {
            if !path.is_empty() {
                out.insert(path.to_string(), type_name(leaf));
            }
        }
    }
}

/// Flattened shape of one JSON value.
pub fn infer_shape(value: &Value) -> String {
    let mut paths = BTreeMap::new();
    flatten("", value, &mut paths);

    let mut shape = String::from("{");
    for (i, (path, kind)) in paths.iter().enumerate() {
        if i > 0 {
            shape.push(',');
        }
        // Value::from(&str) serializes with JSON string escaping
        shape.push_str(&Value::from(path.as_str()).to_string());
        shape.push(':');
        shape.push('"');
        shape.push_str(kind);
        shape.push('"');
    }
    shape.push('}');
    shape
}

/// Collects the distinct shapes seen across a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeFold;

impl Aggregator for ShapeFold {
    type Record = Value;
    type Output = BTreeSet<String>;

    fn fold(self, records: Receiver<RawRecord<Value>>) -> BTreeSet<String> {
        let mut shapes = BTreeSet::new();
        let mut seen = 0u64;
        for record in records {
            seen += 1;
            shapes.insert(infer_shape(&record.value));
        }
        debug!(records = seen, shapes = shapes.len(), "Shape fold finished");
        shapes
    }
}
