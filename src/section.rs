//! Form-level validation orchestration
//!
//! Walks ungrouped fields, flat sections, and repeating sections, combining
//! requirement resolution with shape validation. Problems come back as a
//! key/message mapping; an empty mapping means the form is valid. The walk
//! is pure: identical inputs always produce the identical mapping.
//!
//! Error keys:
//! - ungrouped / flat-section fields: the field key
//! - repeating-section policy: `"<sectionId>::min_rows"` / `"<sectionId>::max_rows"`
//! - repeating-section rows: `"<sectionId>::<rowIndex>::<fieldKey>"` (0-based index)

use crate::context::{value_is_empty, ValueContext, ValueMap};
use crate::requirement::resolve_requirement;
use crate::schema::{section_data_key, Field, Section};
use crate::validate::validate_value;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Composite key for one field in one row of a repeating section.
pub fn row_error_key(section_id: &str, row_index: usize, field_key: &str) -> String {
    format!("{}::{}::{}", section_id, row_index, field_key)
}

fn check_field(
    field: &Field,
    value: Option<&Value>,
    ctx: &ValueContext<'_>,
    row: Option<usize>,
) -> Option<String> {
    let required = resolve_requirement(field, ctx);
    if value_is_empty(value) {
        if required {
            return Some(match row {
                Some(i) => format!("{} is required in row {}", field.label, i + 1),
                None => format!("{} is required", field.label),
            });
        }
        return None;
    }
    let value = value?;
    validate_value(field, value).map(|msg| match row {
        Some(i) => format!("{} {} in row {}", field.label, msg, i + 1),
        None => format!("{} {}", field.label, msg),
    })
}

/// Shared per-row contract: resolve requirement and validate each field of
/// one row, reporting problems through `emit`. `row_position` is 0-based
/// and only used for the human "in row N" suffix.
pub(crate) fn check_row_fields<'a, I, F>(
    fields: I,
    row: &ValueMap,
    ctx: &ValueContext<'_>,
    row_position: usize,
    mut emit: F,
) where
    I: Iterator<Item = &'a Field>,
    F: FnMut(&str, String),
{
    for field in fields {
        if let Some(msg) = check_field(field, row.get(&field.key), ctx, Some(row_position)) {
            emit(&field.key, msg);
        }
    }
}

fn rows_of<'a>(values: &'a ValueMap, section_id: &str) -> &'a [Value] {
    match values.get(&section_data_key(section_id)) {
        Some(Value::Array(rows)) => rows,
        _ => &[],
    }
}

fn validate_repeating(
    section: &Section,
    fields: &[&Field],
    values: &ValueMap,
    errors: &mut BTreeMap<String, String>,
) {
    let rows = rows_of(values, &section.id);

    if let Some(min) = section.min_rows {
        if (rows.len() as u32) < min {
            errors.insert(
                format!("{}::min_rows", section.id),
                format!("{} requires at least {} row(s)", section.title, min),
            );
        }
    }
    if let Some(max) = section.max_rows {
        if (rows.len() as u32) > max {
            errors.insert(
                format!("{}::max_rows", section.id),
                format!("{} allows at most {} row(s)", section.title, max),
            );
        }
    }

    for (row_index, raw) in rows.iter().enumerate() {
        // Indices stay aligned with the raw array: a malformed (non-object)
        // row is skipped without shifting the rows behind it.
        let row = match raw.as_object() {
            Some(r) => r,
            None => continue,
        };
        // The row shadows the outer form, so intra-row rules see sibling
        // values from this row only.
        let ctx = ValueContext::with_row(values, row);
        check_row_fields(fields.iter().copied(), row, &ctx, row_index, |field_key, msg| {
            errors.insert(row_error_key(&section.id, row_index, field_key), msg);
        });
    }
}

/// Validate a full form snapshot against its schema.
///
/// Orphan snapshot keys (fields removed or renamed since the snapshot was
/// saved) are ignored: the walk is driven by the schema, not the snapshot.
pub fn validate_form(
    fields: &[Field],
    sections: &[Section],
    values: &ValueMap,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let ctx = ValueContext::new(values);

    let mut by_section: BTreeMap<&str, Vec<&Field>> = BTreeMap::new();
    for field in fields {
        match field.section_id.as_deref() {
            Some(sid) => by_section.entry(sid).or_default().push(field),
            None => {
                if let Some(msg) = check_field(field, values.get(&field.key), &ctx, None) {
                    errors.insert(field.key.clone(), msg);
                }
            }
        }
    }

    for section in sections {
        let section_fields = match by_section.get(section.id.as_str()) {
            Some(fs) => fs.as_slice(),
            None => continue,
        };
        if section.is_repeating {
            validate_repeating(section, section_fields, values, &mut errors);
        } else {
            for field in section_fields {
                if let Some(msg) = check_field(field, values.get(&field.key), &ctx, None) {
                    errors.insert(field.key.clone(), msg);
                }
            }
        }
    }

    if !errors.is_empty() {
        debug!(count = errors.len(), "form validation found problems");
    }
    errors
}
