//! Request parameters and result records.

use serde_json::{Map, Value};

/// Structured request parameters passed to [`Tool::invoke`](crate::Tool::invoke).
pub type Params = Map<String, Value>;

/// One result record. Providers return JSON objects with their own fields;
/// nothing beyond "a JSON value" is assumed.
pub type Record = Value;

/// Normalise a tool's raw output into a list of records.
///
/// Arrays pass through, `null` becomes empty, anything else is wrapped.
pub fn normalize_output(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Read a non-empty string parameter.
pub fn param_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read an unsigned integer parameter, accepting numeric strings.
pub fn param_u64(params: &Params, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_passes_arrays_through() {
        let records = normalize_output(json!([{"a": 1}, {"b": 2}]));
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn normalize_null_is_empty() {
        assert!(normalize_output(Value::Null).is_empty());
    }

    #[test]
    fn normalize_wraps_scalars_and_objects() {
        assert_eq!(normalize_output(json!({"a": 1})), vec![json!({"a": 1})]);
        assert_eq!(normalize_output(json!("x")), vec![json!("x")]);
    }

    #[test]
    fn normalize_empty_array_is_empty() {
        assert!(normalize_output(json!([])).is_empty());
    }

    #[test]
    fn param_helpers() {
        let params: Params = json!({"keyword": "  trump ", "limit": "7", "n": 3, "blank": " "})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(param_str(&params, "keyword"), Some("trump"));
        assert_eq!(param_str(&params, "blank"), None);
        assert_eq!(param_u64(&params, "limit"), Some(7));
        assert_eq!(param_u64(&params, "n"), Some(3));
        assert_eq!(param_u64(&params, "missing"), None);
    }
}
