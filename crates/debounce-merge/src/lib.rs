//! Snapshot combiner for identify payload debouncing.
//!
//! Folds a sequence of payload snapshots into a single cumulative snapshot so
//! that fields missing from the latest payload are still remembered from
//! earlier ones. Mappings merge key by key; every other value, sequences
//! included, is replaced whole by the later snapshot.

use serde_json::{Map, Value};

/// Deep-merge `snapshots` left to right, starting from an empty mapping.
///
/// Snapshots that are not mappings at the top level carry no fields and are
/// skipped.
pub fn combine_snapshots<'a, I>(snapshots: I) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut combined = Map::new();
    for snapshot in snapshots {
        if let Value::Object(fields) = snapshot {
            merge_fields(&mut combined, fields);
        }
    }
    Value::Object(combined)
}

/// Merge `source` into `target` in place.
///
/// When both sides are mappings the merge recurses; otherwise `target` is
/// overwritten with a copy of `source`.
pub fn merge_into(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_fields), Value::Object(source_fields)) => {
            merge_fields(target_fields, source_fields);
        }
        (target, source) => *target = source.clone(),
    }
}

fn merge_fields(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        match target.get_mut(key) {
            Some(existing) => merge_into(existing, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
