//! Tree values and the sparse-tree helpers the patch engine is built on
//!
//! The remote store holds JSON. A key whose value is `null` does not exist,
//! and neither does a mapping with no present children, so "absent" and
//! `null` are interchangeable everywhere in this module.

use serde_json::{Map, Value};

/// A recursively structured value as stored at a location
pub type TreeValue = Value;

/// Returns true when the value represents a missing node.
///
/// A mapping or array is absent when every child is absent.
pub fn is_absent(value: &TreeValue) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.values().all(is_absent),
        Value::Array(items) => items.iter().all(is_absent),
        _ => false,
    }
}

/// Strip absent children from `value`, collapsing it to `null` when nothing
/// present is left.
///
/// Array elements keep their indices; an absent element in the middle of an
/// array stays as `null`.
pub fn prune(value: TreeValue) -> TreeValue {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, prune(child)))
                .filter(|(_, child)| !child.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(prune).collect();
            while items.last().is_some_and(Value::is_null) {
                items.pop();
            }
            if items.is_empty() {
                Value::Null
            } else {
                Value::Array(items)
            }
        }
        other => other,
    }
}

/// Performs a deep equality check between two tree values.
///
/// Mappings are equal when they hold the same key set and every child is
/// recursively equal; key order never matters. Numbers compare by value, so
/// `1` equals `1.0`. Absent values (`null`, `{}`, `[]`) are all equal.
pub fn deep_equal(a: &TreeValue, b: &TreeValue) -> bool {
    if is_absent(a) || is_absent(b) {
        return is_absent(a) && is_absent(b);
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                return true;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(arr_a), Value::Array(arr_b)) => {
            if arr_a.len() == arr_b.len() {
                arr_a.iter().zip(arr_b).all(|(x, y)| deep_equal(x, y))
            } else {
                // Trailing absent elements do not count
                maps_equal(&array_to_map(arr_a), &array_to_map(arr_b))
            }
        }
        (Value::Object(obj_a), Value::Object(obj_b)) => maps_equal(obj_a, obj_b),
        // An array is stored remotely as an index-keyed mapping
        (Value::Array(arr), Value::Object(obj)) | (Value::Object(obj), Value::Array(arr)) => {
            maps_equal(&array_to_map(arr), obj)
        }
        _ => false,
    }
}

fn maps_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    // Absent children do not count as keys
    let present = |m: &Map<String, Value>| m.values().filter(|v| !is_absent(v)).count();
    if present(a) != present(b) {
        return false;
    }
    a.iter()
        .filter(|(_, v)| !is_absent(v))
        .all(|(key, val_a)| b.get(key).is_some_and(|val_b| deep_equal(val_a, val_b)))
}

fn array_to_map(items: &[Value]) -> Map<String, Value> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| (i.to_string(), v.clone()))
        .collect()
}

/// Split a slash-delimited path into its non-empty segments.
///
/// `"/"`, `""` and `"/a/b/"` style inputs are all accepted.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Look up the value at `segments` below `root`.
///
/// Returns `None` when any node along the way is missing.
pub fn get_path<'a>(root: &'a TreeValue, segments: &[&str]) -> Option<&'a TreeValue> {
    let mut node = root;
    for segment in segments {
        node = match node {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Take `node` out as a mapping, leaving `null` behind.
///
/// `null` and scalars become an empty mapping; arrays become index-keyed
/// mappings.
fn take_as_map(node: &mut TreeValue) -> Map<String, Value> {
    match std::mem::take(node) {
        Value::Object(map) => map,
        Value::Array(items) => array_to_map(&items),
        _ => Map::new(),
    }
}

/// Set the value at `segments` below `root`, creating missing intermediate
/// mappings. Absent children of `value` are dropped before it is stored.
/// Writing an absent value removes the key and prunes mappings the removal
/// left empty.
pub fn set_path(root: &mut TreeValue, segments: &[&str], value: TreeValue) {
    let value = prune(value);
    let Some((head, rest)) = segments.split_first() else {
        *root = value;
        return;
    };

    let mut map = take_as_map(root);
    if rest.is_empty() {
        if value.is_null() {
            map.remove(*head);
        } else {
            map.insert((*head).to_string(), value);
        }
    } else {
        let child = map
            .entry((*head).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        set_path(child, rest, value);
        if is_absent(child) {
            map.remove(*head);
        }
    }
    *root = Value::Object(map);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_equal_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":2,"d":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"d":3,"c":2},"a":1}"#).unwrap();
        assert!(deep_equal(&a, &b));
    }

    #[test]
    fn test_deep_equal_detects_differences() {
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 2})));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!("1"), &json!(1)));
        assert!(!deep_equal(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_deep_equal_absent_values() {
        assert!(deep_equal(&Value::Null, &json!({})));
        assert!(deep_equal(&json!({"a": null}), &Value::Null));
        assert!(deep_equal(&json!({"a": 1, "b": null}), &json!({"a": 1})));
        assert!(!deep_equal(&Value::Null, &json!(0)));
        assert!(deep_equal(&json!({"a": {"b": null, "c": []}}), &json!({})));
        assert!(deep_equal(&json!([1, null]), &json!([1])));
        assert!(!deep_equal(&json!({"a": {"b": null, "c": 0}}), &Value::Null));
    }

    #[test]
    fn test_prune_drops_absent_children() {
        assert_eq!(prune(json!({"a": null})), Value::Null);
        assert_eq!(
            prune(json!({"a": {"b": null, "c": 1}, "d": {"e": {}}})),
            json!({"a": {"c": 1}})
        );
        assert_eq!(prune(json!([1, null, 3, null])), json!([1, null, 3]));
        assert_eq!(prune(json!("x")), json!("x"));
    }

    #[test]
    fn test_set_path_never_stores_null_leaves() {
        let mut root = Value::Null;
        set_path(&mut root, &[], json!({"a": null}));
        assert_eq!(root, Value::Null);

        set_path(&mut root, &["x"], json!({"y": null, "z": 2}));
        assert_eq!(root, json!({"x": {"z": 2}}));

        set_path(&mut root, &["w"], json!({"v": {"u": null}}));
        assert_eq!(root, json!({"x": {"z": 2}}));
    }

    #[test]
    fn test_deep_equal_numbers_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(!deep_equal(&json!(1), &json!(1.5)));
    }

    #[test]
    fn test_deep_equal_array_and_index_map() {
        assert!(deep_equal(&json!(["x", "y"]), &json!({"0": "x", "1": "y"})));
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert!(split_path("").is_empty());
        assert_eq!(split_path("/a/b/"), vec!["a", "b"]);
        assert_eq!(split_path("a//b"), vec!["a", "b"]);
    }

    #[test]
    fn test_get_path() {
        let root = json!({"a": {"b": [10, 20]}});
        assert_eq!(get_path(&root, &["a", "b", "1"]), Some(&json!(20)));
        assert_eq!(get_path(&root, &["a", "x"]), None);
        assert_eq!(get_path(&root, &[]), Some(&root));
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut root = Value::Null;
        set_path(&mut root, &["a", "b", "c"], json!(1));
        assert_eq!(root, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_path_null_prunes_empty_parents() {
        let mut root = json!({"a": {"b": {"c": 1}}, "z": true});
        set_path(&mut root, &["a", "b", "c"], Value::Null);
        assert_eq!(root, json!({"z": true}));
    }

    #[test]
    fn test_set_path_widens_scalars() {
        let mut root = json!({"a": 5});
        set_path(&mut root, &["a", "b"], json!("x"));
        assert_eq!(root, json!({"a": {"b": "x"}}));
    }
}
