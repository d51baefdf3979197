//! Form version diffing
//!
//! Flattens two value snapshots of the same dynamic schema into comparable
//! field entries and reports field-level changes, repeating-row deltas, and
//! attachment add/remove changes for change-request review. Diffing never
//! fails on mismatched snapshot shapes: an absent key on either side is
//! compared as that side's cleared value.

use crate::context::ValueMap;
use crate::schema::{Field, SECTION_DATA_PREFIX};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Step id assigned to snapshot entries that are not nested under a step.
pub const ROOT_STEP_ID: &str = "root";

/// One comparable entry of a flattened snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatField {
    pub step_id: String,
    pub key: String,
    pub value: Value,
}

/// One field whose value differs between the two snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub step_id: String,
    pub field_key: String,
    pub field_label: String,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttachmentAction {
    Added,
    Removed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentChange {
    pub filename: String,
    pub action: AttachmentAction,
}

/// Per-row field changes for one index present in both snapshots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowChange {
    pub row_index: usize,
    pub changes: Vec<FieldChange>,
}

/// Difference report for a repeating section's rows. Rows beyond the
/// shorter snapshot are counted, not diffed individually.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatingRowsDelta {
    pub rows_added: usize,
    pub rows_removed: usize,
    pub row_changes: Vec<RowChange>,
}

/// A stored form version as handed over by the external version store.
/// The engine reads only `values`; the metadata is the store's concern.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormVersion {
    pub version: u32,
    pub source: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub values: ValueMap,
}

fn is_step_map(key: &str, value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && !key.starts_with(SECTION_DATA_PREFIX),
        _ => false,
    }
}

/// Flatten a snapshot whose entries may nest field maps under step keys.
///
/// Heuristic fallback: a non-empty object value whose key lacks the
/// section-data prefix is treated as a nested step's field map. A field
/// whose own value is a plain keyed object (a structured USER_SELECT, say)
/// is misclassified by this guess; producers that know their step keys
/// should call [`flatten_tagged`] instead.
pub fn flatten(snapshot: &ValueMap) -> Vec<FlatField> {
    flatten_inner(snapshot, None)
}

/// Flatten with an explicit set of step keys, eliminating the heuristic:
/// only entries named in `step_ids` are expanded as nested step maps.
pub fn flatten_tagged(snapshot: &ValueMap, step_ids: &BTreeSet<String>) -> Vec<FlatField> {
    flatten_inner(snapshot, Some(step_ids))
}

fn flatten_inner(snapshot: &ValueMap, step_ids: Option<&BTreeSet<String>>) -> Vec<FlatField> {
    let mut out = Vec::new();
    for (key, value) in snapshot {
        let nested = match step_ids {
            Some(ids) => ids.contains(key) && value.is_object(),
            None => is_step_map(key, value),
        };
        if nested {
            if let Value::Object(inner) = value {
                for (ikey, ivalue) in inner {
                    out.push(FlatField {
                        step_id: key.clone(),
                        key: ikey.clone(),
                        value: ivalue.clone(),
                    });
                }
            }
        } else {
            out.push(FlatField {
                step_id: ROOT_STEP_ID.to_string(),
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    out
}

/// Deep equality with cleared-value normalization: absent, `null`, and
/// `""` all represent "cleared" and compare as unchanged against each
/// other.
fn values_unchanged(old: Option<&Value>, new: Option<&Value>) -> bool {
    let cleared = |v: Option<&Value>| {
        matches!(v, None | Some(Value::Null)) || matches!(v, Some(Value::String(s)) if s.is_empty())
    };
    match (cleared(old), cleared(new)) {
        (true, true) => true,
        (false, false) => old == new,
        _ => false,
    }
}

fn label_for(fields: &[Field], key: &str) -> String {
    fields
        .iter()
        .find(|f| f.key == key)
        .map(|f| f.label.clone())
        .unwrap_or_else(|| key.to_string())
}

/// Field-level changes between two snapshots. Both sides are flattened with
/// the same step assignment, keyed by `(stepId, key)`, and compared with
/// cleared-value normalization; labels come from the schema, falling back
/// to the key.
pub fn diff_fields(fields: &[Field], original: &ValueMap, proposed: &ValueMap) -> Vec<FieldChange> {
    diff_flat(fields, &flatten(original), &flatten(proposed))
}

fn diff_flat(fields: &[Field], original: &[FlatField], proposed: &[FlatField]) -> Vec<FieldChange> {
    let index = |entries: &[FlatField]| -> BTreeMap<(String, String), Value> {
        entries
            .iter()
            .map(|e| ((e.step_id.clone(), e.key.clone()), e.value.clone()))
            .collect()
    };
    let old_map = index(original);
    let new_map = index(proposed);

    let keys: BTreeSet<&(String, String)> = old_map.keys().chain(new_map.keys()).collect();
    let mut changes = Vec::new();
    for k in keys {
        let old = old_map.get(k);
        let new = new_map.get(k);
        if values_unchanged(old, new) {
            continue;
        }
        changes.push(FieldChange {
            step_id: k.0.clone(),
            field_key: k.1.clone(),
            field_label: label_for(fields, &k.1),
            old_value: old.cloned().unwrap_or(Value::Null),
            new_value: new.cloned().unwrap_or(Value::Null),
        });
    }
    changes
}

/// Attachment set difference: ids only in `proposed` were added, ids only
/// in `original` were removed, unchanged ids produce no entry.
pub fn diff_attachments(original: &[String], proposed: &[String]) -> Vec<AttachmentChange> {
    let old: BTreeSet<&String> = original.iter().collect();
    let new: BTreeSet<&String> = proposed.iter().collect();

    let mut changes = Vec::new();
    for id in new.difference(&old) {
        changes.push(AttachmentChange {
            filename: (*id).clone(),
            action: AttachmentAction::Added,
        });
    }
    for id in old.difference(&new) {
        changes.push(AttachmentChange {
            filename: (*id).clone(),
            action: AttachmentAction::Removed,
        });
    }
    changes
}

/// Row-level delta for a repeating section. Indices present in both
/// snapshots get per-field diffs (cleared-value normalization included);
/// surplus rows on either side are only counted.
pub fn diff_repeating_rows(
    fields: &[Field],
    original_rows: &[ValueMap],
    proposed_rows: &[ValueMap],
) -> RepeatingRowsDelta {
    let common = original_rows.len().min(proposed_rows.len());
    let mut row_changes = Vec::new();
    for i in 0..common {
        let changes = diff_fields(fields, &original_rows[i], &proposed_rows[i]);
        if !changes.is_empty() {
            row_changes.push(RowChange {
                row_index: i,
                changes,
            });
        }
    }
    RepeatingRowsDelta {
        rows_added: proposed_rows.len().saturating_sub(original_rows.len()),
        rows_removed: original_rows.len().saturating_sub(proposed_rows.len()),
        row_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn snapshot(json: Value) -> ValueMap {
        json.as_object().cloned().unwrap()
    }

    fn text_field(key: &str, label: &str) -> Field {
        Field {
            key: key.into(),
            label: label.into(),
            field_type: FieldType::Text,
            required: false,
            options: None,
            validation: None,
            section_id: None,
            conditional_requirements: vec![],
        }
    }

    #[test]
    fn test_flatten_expands_step_maps() {
        let snap = snapshot(json!({
            "summary": "top-level",
            "step-1": {"status": "done", "owner": "ops"},
            "__section_s1": [{"item": "a"}]
        }));
        let flat = flatten(&snap);

        let step_entries: Vec<_> = flat.iter().filter(|f| f.step_id == "step-1").collect();
        assert_eq!(step_entries.len(), 2);
        let root: Vec<_> = flat.iter().filter(|f| f.step_id == ROOT_STEP_ID).collect();
        // `summary` and the reserved section-data entry stay at root.
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_flatten_tagged_skips_heuristic() {
        // A structured value the heuristic would misread as a step map.
        let snap = snapshot(json!({
            "assignee": {"id": "u1", "name": "Dana"},
            "step-1": {"status": "done"}
        }));
        let mut steps = BTreeSet::new();
        steps.insert("step-1".to_string());
        let flat = flatten_tagged(&snap, &steps);

        assert!(flat
            .iter()
            .any(|f| f.step_id == ROOT_STEP_ID && f.key == "assignee"));
        assert!(flat.iter().any(|f| f.step_id == "step-1" && f.key == "status"));
    }

    #[test]
    fn test_diff_identical_snapshot_is_empty() {
        let snap = snapshot(json!({
            "summary": "same",
            "step-1": {"status": "done"},
        }));
        assert!(diff_fields(&[], &snap, &snap).is_empty());
    }

    #[test]
    fn test_cleared_representations_are_unchanged() {
        let a = snapshot(json!({"a": ""}));
        let b = snapshot(json!({}));
        assert!(diff_fields(&[], &a, &b).is_empty());
        assert!(diff_fields(&[], &b, &a).is_empty());

        let c = snapshot(json!({"a": null}));
        assert!(diff_fields(&[], &a, &c).is_empty());

        let d = snapshot(json!({"a": "x"}));
        let changes = diff_fields(&[], &a, &d);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, json!(""));
        assert_eq!(changes[0].new_value, json!("x"));
    }

    #[test]
    fn test_diff_uses_schema_labels() {
        let fields = vec![text_field("summary", "Summary")];
        let changes = diff_fields(
            &fields,
            &snapshot(json!({"summary": "a", "other": 1})),
            &snapshot(json!({"summary": "b", "other": 1})),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_label, "Summary");
        assert_eq!(changes[0].step_id, ROOT_STEP_ID);
    }

    #[test]
    fn test_diff_nested_step_change() {
        let original = snapshot(json!({"step-1": {"status": "open"}}));
        let proposed = snapshot(json!({"step-1": {"status": "done"}}));
        let changes = diff_fields(&[], &original, &proposed);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].step_id, "step-1");
        assert_eq!(changes[0].field_key, "status");
    }

    #[test]
    fn test_diff_attachments_both_ways() {
        let original = vec!["ATT-1".to_string(), "ATT-2".to_string()];
        let proposed = vec!["ATT-2".to_string(), "ATT-3".to_string()];
        let changes = diff_attachments(&original, &proposed);
        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&AttachmentChange {
            filename: "ATT-3".into(),
            action: AttachmentAction::Added,
        }));
        assert!(changes.contains(&AttachmentChange {
            filename: "ATT-1".into(),
            action: AttachmentAction::Removed,
        }));
        assert!(diff_attachments(&original, &original).is_empty());
    }

    #[test]
    fn test_diff_consumes_version_payloads() {
        let original: FormVersion = serde_json::from_value(json!({
            "version": 1,
            "source": "task-completion",
            "author": "rivera",
            "createdAt": "2026-02-01T10:00:00Z",
            "values": {"summary": "before"}
        }))
        .unwrap();
        let proposed: FormVersion = serde_json::from_value(json!({
            "version": 2,
            "source": "change-request",
            "author": "chen",
            "createdAt": "2026-02-03T09:30:00Z",
            "values": {"summary": "after"}
        }))
        .unwrap();
        let changes = diff_fields(&[], &original.values, &proposed.values);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_key, "summary");
    }

    #[test]
    fn test_repeating_rows_delta() {
        let fields = vec![text_field("item", "Item")];
        let original = vec![
            snapshot(json!({"item": "a"})),
            snapshot(json!({"item": "b"})),
        ];
        let proposed = vec![
            snapshot(json!({"item": "a"})),
            snapshot(json!({"item": "B"})),
            snapshot(json!({"item": "c"})),
        ];
        let delta = diff_repeating_rows(&fields, &original, &proposed);
        assert_eq!(delta.rows_added, 1);
        assert_eq!(delta.rows_removed, 0);
        assert_eq!(delta.row_changes.len(), 1);
        assert_eq!(delta.row_changes[0].row_index, 1);
        assert_eq!(delta.row_changes[0].changes[0].new_value, json!("B"));
    }
}
