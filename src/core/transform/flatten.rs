//! Nested value flattening
//!
//! Converts an arbitrarily nested JSON value into a single-level map:
//! - `{"a": {"b": 1}}` → `{"a_b": 1}`
//! - `{"c": [2, 3]}` → `{"c_0": 2, "c_1": 3}`

use serde_json::Value;
use std::collections::BTreeMap;

/// Separator placed between key segments
pub const SEPARATOR: char = '_';

/// Flatten a nested value into a map of scalar leaves
///
/// Object keys and zero-based array positions become key segments joined
/// by [`SEPARATOR`]. Empty objects and arrays contribute no keys. A bare
/// scalar flattens to a single entry under the empty key.
///
/// When two paths collapse to the same key (`{"a_b": 1, "a": {"b": 2}}`)
/// the one visited last wins.
///
/// # Examples
///
/// ```
/// use sluice::core::transform::flatten::flatten;
/// use serde_json::json;
///
/// let flat = flatten(&json!({"a": {"b": 1, "c": [2, 3]}}));
/// assert_eq!(flat["a_b"], 1);
/// assert_eq!(flat["a_c_0"], 2);
/// assert_eq!(flat["a_c_1"], 3);
/// ```
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    let mut prefix = String::new();
    flatten_into(value, &mut prefix, &mut out);
    out
}

// `prefix` always ends with the separator unless it is empty.
fn flatten_into(value: &Value, prefix: &mut String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let len = prefix.len();
                prefix.push_str(key);
                prefix.push(SEPARATOR);
                flatten_into(child, prefix, out);
                prefix.truncate(len);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let len = prefix.len();
                prefix.push_str(&index.to_string());
                prefix.push(SEPARATOR);
                flatten_into(child, prefix, out);
                prefix.truncate(len);
            }
        }
        scalar => {
            let key = prefix.strip_suffix(SEPARATOR).unwrap_or(prefix.as_str());
            out.insert(key.to_string(), scalar.clone());
        }
    }
}
