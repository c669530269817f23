//! Payload sanitation before persistence.

use serde_json::{Map, Value};
use tracing::warn;

/// Largest serialized payload accepted by `save_stats`.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Containers nested deeper than this are dropped.
pub const MAX_DEPTH: usize = 32;

/// Make a payload safe to store.
///
/// Null object fields and array entries are removed (non-finite floats
/// serialize to null, so they go too), containers deeper than [`MAX_DEPTH`]
/// are dropped, and while the serialized form exceeds `max_bytes` the
/// largest array in the document is halved.
pub fn sanitize_for_database(value: &Value, max_bytes: usize) -> Value {
    let mut clean = strip(value, 0).unwrap_or(Value::Null);

    loop {
        let size = serialized_len(&clean);
        if size <= max_bytes {
            break;
        }
        let Some((pointer, len)) = largest_array(&clean, String::new()) else {
            warn!(
                "Payload still {} bytes over limit with no arrays to truncate",
                size - max_bytes
            );
            break;
        };
        if let Some(Value::Array(items)) = clean.pointer_mut(&pointer) {
            items.truncate(len / 2);
        }
        warn!(
            "Payload {} bytes exceeds {}; truncated array at {:?} from {} to {}",
            size,
            max_bytes,
            pointer,
            len,
            len / 2
        );
    }

    clean
}

fn strip(value: &Value, depth: usize) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => {
            if depth >= MAX_DEPTH {
                return None;
            }
            Some(Value::Array(
                items.iter().filter_map(|v| strip(v, depth + 1)).collect(),
            ))
        }
        Value::Object(fields) => {
            if depth >= MAX_DEPTH {
                return None;
            }
            let map: Map<String, Value> = fields
                .iter()
                .filter_map(|(k, v)| strip(v, depth + 1).map(|v| (k.clone(), v)))
                .collect();
            Some(Value::Object(map))
        }
        other => Some(other.clone()),
    }
}

fn serialized_len(value: &Value) -> usize {
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}

/// JSON pointer and length of the non-empty array with the most elements.
fn largest_array(value: &Value, pointer: String) -> Option<(String, usize)> {
    let mut best: Option<(String, usize)> = None;
    let mut consider = |candidate: Option<(String, usize)>| {
        if let Some((p, len)) = candidate {
            if best.as_ref().map_or(true, |(_, b)| len > *b) {
                best = Some((p, len));
            }
        }
    };

    match value {
        Value::Array(items) => {
            if !items.is_empty() {
                consider(Some((pointer.clone(), items.len())));
            }
            for (idx, item) in items.iter().enumerate() {
                consider(largest_array(item, format!("{}/{}", pointer, idx)));
            }
        }
        Value::Object(fields) => {
            for (key, item) in fields {
                let escaped = key.replace('~', "~0").replace('/', "~1");
                consider(largest_array(item, format!("{}/{}", pointer, escaped)));
            }
        }
        _ => {}
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_drops_nulls() {
        let value = json!({
            "region": "euw1",
            "icon": null,
            "units": [{"id": "a", "icon": null}, null]
        });
        let clean = sanitize_for_database(&value, DEFAULT_MAX_PAYLOAD_BYTES);
        assert_eq!(clean, json!({"region": "euw1", "units": [{"id": "a"}]}));
    }

    #[test]
    fn test_non_finite_numbers_removed() {
        let value = serde_json::to_value(vec![1.0, f64::NAN, f64::INFINITY]).unwrap();
        let clean = sanitize_for_database(&json!({ "values": value }), DEFAULT_MAX_PAYLOAD_BYTES);
        assert_eq!(clean, json!({"values": [1.0]}));
    }

    #[test]
    fn test_caps_depth() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 5) {
            value = json!({ "next": value });
        }
        let clean = sanitize_for_database(&value, DEFAULT_MAX_PAYLOAD_BYTES);

        let mut depth = 0;
        let mut cursor = &clean;
        while let Some(next) = cursor.get("next") {
            depth += 1;
            cursor = next;
        }
        assert!(depth < MAX_DEPTH);
    }

    #[test]
    fn test_truncates_largest_array_to_fit() {
        let value = json!({
            "region": "global",
            "summary": {"top": [1, 2, 3]},
            "units": (0..500).map(|i| json!({"id": format!("unit-{}", i)})).collect::<Vec<_>>()
        });
        let max = 2_000;
        let clean = sanitize_for_database(&value, max);

        assert!(serde_json::to_vec(&clean).unwrap().len() <= max);
        assert_eq!(clean["summary"]["top"], json!([1, 2, 3]));
        let units = clean["units"].as_array().unwrap();
        assert!(!units.is_empty());
        assert!(units.len() < 500);
        assert_eq!(units[0]["id"], "unit-0");
    }

    #[test]
    fn test_small_payload_unchanged() {
        let value = json!({"region": "kr", "units": [{"id": "a", "count": 3}]});
        assert_eq!(sanitize_for_database(&value, DEFAULT_MAX_PAYLOAD_BYTES), value);
    }

    #[test]
    fn test_largest_array_pointer_escapes_keys() {
        let value = json!({"a/b": [1, 2, 3], "c": [1]});
        assert_eq!(largest_array(&value, String::new()), Some(("/a~1b".to_string(), 3)));
    }
}
