//! Dotted-path access into JSON payloads
//!
//! Paths such as `address.city` or `contacts.0.email` address nested objects
//! and array elements.

use serde_json::Value;

/// Look up the value at `path`. An empty path addresses the root.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Look up the value at `path`, treating JSON `null` as absent
pub fn lookup_present<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    lookup(value, path).filter(|v| !v.is_null())
}

/// Render a scalar as an identifier (strings as-is, numbers in decimal)
pub fn as_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The entity id carried by a payload (`id` field)
pub fn entity_id(payload: &Value) -> Option<String> {
    lookup_present(payload, "id").and_then(as_key)
}

/// Compare two values, optionally ignoring ASCII case for strings
pub fn values_equal(a: &Value, b: &Value, case_insensitive: bool) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) if case_insensitive => x.eq_ignore_ascii_case(y),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let payload = json!({
            "address": { "city": "Oslo" },
            "tags": ["a", "b"],
            "note": null
        });
        assert_eq!(lookup(&payload, "address.city"), Some(&json!("Oslo")));
        assert_eq!(lookup(&payload, "tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&payload, "tags.x"), None);
        assert_eq!(lookup(&payload, "missing.path"), None);
        assert_eq!(lookup(&payload, "note"), Some(&Value::Null));
        assert_eq!(lookup_present(&payload, "note"), None);
        assert_eq!(lookup(&payload, ""), Some(&payload));
    }

    #[test]
    fn test_entity_id() {
        assert_eq!(entity_id(&json!({"id": "c-1"})), Some("c-1".to_string()));
        assert_eq!(entity_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(entity_id(&json!({"id": ""})), None);
        assert_eq!(entity_id(&json!({"name": "x"})), None);
    }

    #[test]
    fn test_values_equal() {
        assert!(values_equal(&json!("A@x.io"), &json!("a@X.io"), true));
        assert!(!values_equal(&json!("A@x.io"), &json!("a@X.io"), false));
        assert!(values_equal(&json!(1), &json!(1.0), false));
    }
}
