//! Field value shape validation
//!
//! Requiredness is resolved separately; this module only checks the shape
//! of a value once one is present. Invalid regex patterns degrade to
//! no-constraint rather than failing the call.

use crate::context::{value_as_f64, value_is_empty};
use crate::schema::{Field, FieldType};
use regex::Regex;
use serde_json::Value;

fn display_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        other => other.to_string().chars().count(),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validate a non-empty value against the field's declared type and
/// constraints. Returns a human-readable message, or `None` when the value
/// is acceptable (or empty: emptiness is the requirement resolver's job).
pub fn validate_value(field: &Field, value: &Value) -> Option<String> {
    if value_is_empty(Some(value)) {
        return None;
    }
    let validation = match field.validation.as_ref() {
        Some(v) => v,
        None if field.field_type == FieldType::Number => return check_number(value, None, None),
        None => return None,
    };

    match field.field_type {
        FieldType::Text | FieldType::Textarea => {
            let len = display_len(value);
            if let Some(min) = validation.min_length {
                if len < min as usize {
                    return Some(format!("must be at least {} characters", min));
                }
            }
            if let Some(max) = validation.max_length {
                if len > max as usize {
                    return Some(format!("must be at most {} characters", max));
                }
            }
            if let Some(ref pattern) = validation.pattern {
                // An unparseable pattern is treated as no constraint.
                if let Ok(re) = Regex::new(pattern) {
                    if !re.is_match(&as_text(value)) {
                        return Some("does not match the required format".to_string());
                    }
                }
            }
            None
        }
        FieldType::Number => check_number(value, validation.min_value, validation.max_value),
        // Remaining types have no shape constraints beyond requiredness.
        _ => None,
    }
}

fn check_number(value: &Value, min: Option<f64>, max: Option<f64>) -> Option<String> {
    let n = match value_as_f64(value) {
        Some(n) => n,
        None => return Some("must be a valid number".to_string()),
    };
    if let Some(min) = min {
        if n < min {
            return Some(format!("must be at least {}", min));
        }
    }
    if let Some(max) = max {
        if n > max {
            return Some(format!("must be at most {}", max));
        }
    }
    None
}
