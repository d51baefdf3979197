//! Value contexts and dynamic-value coercions
//!
//! Field values are loosely typed (`serde_json::Value`); the helpers here
//! are the single place that decides emptiness and numeric coercion so the
//! evaluator and validators agree.

use serde_json::Value;

/// A form value snapshot: field key to dynamic value.
pub type ValueMap = serde_json::Map<String, Value>;

/// Lookup scope for condition evaluation: the optional row context shadows
/// the global snapshot. Implemented as a two-level borrow chain rather than
/// a merged copy so row-local keys never leak between sibling rows.
#[derive(Clone, Copy, Debug)]
pub struct ValueContext<'a> {
    global: &'a ValueMap,
    row: Option<&'a ValueMap>,
}

impl<'a> ValueContext<'a> {
    pub fn new(global: &'a ValueMap) -> Self {
        Self { global, row: None }
    }

    pub fn with_row(global: &'a ValueMap, row: &'a ValueMap) -> Self {
        Self {
            global,
            row: Some(row),
        }
    }

    /// Row context first, then the global snapshot.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        if let Some(row) = self.row {
            if let Some(v) = row.get(key) {
                return Some(v);
            }
        }
        self.global.get(key)
    }
}

/// Absent, null, empty string, or empty array count as empty. Everything
/// else (including `false` and `0`) is a present value.
pub fn value_is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

/// Numeric coercion for NUMBER fields: JSON numbers pass through, numeric
/// strings are parsed, anything else is not a number.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> ValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_row_shadows_global() {
        let global = map(&[("a", json!("outer")), ("b", json!("global"))]);
        let row = map(&[("a", json!("inner"))]);
        let ctx = ValueContext::with_row(&global, &row);
        assert_eq!(ctx.get("a"), Some(&json!("inner")));
        assert_eq!(ctx.get("b"), Some(&json!("global")));
        assert_eq!(ctx.get("c"), None);
    }

    #[test]
    fn test_emptiness() {
        assert!(value_is_empty(None));
        assert!(value_is_empty(Some(&Value::Null)));
        assert!(value_is_empty(Some(&json!(""))));
        assert!(value_is_empty(Some(&json!([]))));
        assert!(!value_is_empty(Some(&json!("x"))));
        assert!(!value_is_empty(Some(&json!([1]))));
        assert!(!value_is_empty(Some(&json!(false))));
        assert!(!value_is_empty(Some(&json!(0))));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(value_as_f64(&json!(50)), Some(50.0));
        assert_eq!(value_as_f64(&json!("50")), Some(50.0));
        assert_eq!(value_as_f64(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(value_as_f64(&json!("abc")), None);
        assert_eq!(value_as_f64(&json!([1])), None);
    }
}
