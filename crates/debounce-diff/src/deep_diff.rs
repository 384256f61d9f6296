//! Deep diff: the minimal patch that takes a base tree to a candidate tree.
//!
//! Both sides are JSON mappings or sequences. Every key (or index) of the
//! candidate is compared against the base value at the same key; equal values
//! are dropped, changed values are either recursed into or copied whole. The
//! result only ever describes additions and changes, never removals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::equal::values_equal;

/// Options controlling how sequences are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// When `true`, sequences are diffed element by element and the changed
    /// elements are re-indexed from 0. When `false`, a sequence that differs
    /// from the base in any way is reported whole.
    pub diff_array: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self { diff_array: true }
    }
}

impl DiffOptions {
    /// Treat sequences as opaque values.
    pub fn atomic_arrays() -> Self {
        Self { diff_array: false }
    }
}

/// Compute what is new or changed in `candidate` relative to `base`.
///
/// Non-container inputs (`null`, scalars) are treated as empty mappings.
/// Returns `None` when the candidate introduces nothing new.
pub fn diff_values(candidate: &Value, base: &Value, options: DiffOptions) -> Option<Value> {
    let empty = Value::Object(Map::new());
    let candidate = if is_container(candidate) { candidate } else { &empty };
    let base = if is_container(base) { base } else { &empty };

    let changes = changes(candidate, base, options);
    if is_empty_container(&changes) {
        None
    } else {
        Some(changes)
    }
}

fn changes(candidate: &Value, base: &Value, options: DiffOptions) -> Value {
    match candidate {
        Value::Array(items) => {
            let mut result = Vec::new();
            for (index, value) in items.iter().enumerate() {
                let base_value = lookup_index(base, index);
                if base_value.is_some_and(|b| values_equal(value, b)) {
                    continue;
                }
                if !base.is_array() && result.len() < index {
                    // A sequence diffed against a mapping keeps its indices;
                    // the holes serialize as nulls.
                    result.resize(index, Value::Null);
                }
                result.push(changed_value(value, base_value, options));
            }
            Value::Array(result)
        }
        Value::Object(entries) => {
            let mut result = Map::new();
            let mut counter = 0usize;
            for (key, value) in entries {
                let base_value = lookup_key(base, key);
                if base_value.is_some_and(|b| values_equal(value, b)) {
                    continue;
                }
                let result_key = if base.is_array() {
                    let reindexed = counter.to_string();
                    counter += 1;
                    reindexed
                } else {
                    key.clone()
                };
                result.insert(result_key, changed_value(value, base_value, options));
            }
            Value::Object(result)
        }
        _ => Value::Object(Map::new()),
    }
}

fn changed_value(value: &Value, base_value: Option<&Value>, options: DiffOptions) -> Value {
    match base_value {
        Some(base_value) if recurses(value, base_value, options) => {
            changes(value, base_value, options)
        }
        _ => value.clone(),
    }
}

fn recurses(value: &Value, base_value: &Value, options: DiffOptions) -> bool {
    if options.diff_array {
        is_container(value) && is_container(base_value)
    } else {
        value.is_object() && base_value.is_object()
    }
}

fn lookup_key<'a>(base: &'a Value, key: &str) -> Option<&'a Value> {
    match base {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .filter(|i| i.to_string() == key)
            .and_then(|i| items.get(i)),
        _ => None,
    }
}

fn lookup_index(base: &Value, index: usize) -> Option<&Value> {
    match base {
        Value::Array(items) => items.get(index),
        Value::Object(map) => map.get(&index.to_string()),
        _ => None,
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
