//! Task-completion payload assembly
//!
//! Packages a validated snapshot for the external submission API and
//! extracts attachment references from anywhere in the value tree. The
//! attachment scan is structural, not a validation step: it never fails,
//! and an input without references yields an empty list.

use crate::context::ValueMap;
use crate::schema::ATTACHMENT_PREFIX;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// A previously saved in-progress snapshot, as handed back by the external
/// draft store. Keys that no longer exist in the current schema are inert
/// during validation and passed through untouched on submission.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub values: ValueMap,
    #[serde(default)]
    pub execution_notes: String,
}

/// Non-linked completion payload: the flat field map (repeating rows stay
/// under their section-data key) plus the attachment side channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub values: ValueMap,
    pub attachment_refs: Vec<String>,
}

/// Pull every `ATT-<id>` token out of one string. References may be
/// embedded in free text ("see ATT-123"), so this scans for the prefix
/// rather than matching the whole string.
fn refs_in_str(s: &str, out: &mut BTreeSet<String>) {
    let mut rest = s;
    while let Some(pos) = rest.find(ATTACHMENT_PREFIX) {
        let after = &rest[pos + ATTACHMENT_PREFIX.len()..];
        let id_len = after
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(after.len());
        if id_len > 0 {
            out.insert(format!("{}{}", ATTACHMENT_PREFIX, &after[..id_len]));
        }
        rest = &after[id_len..];
    }
}

pub(crate) fn collect_refs(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => refs_in_str(s, out),
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

/// Collect every attachment reference in a value tree - nested objects,
/// arrays, and repeating/linked row values included. Flat, de-duplicated,
/// sorted.
pub fn extract_attachment_refs(value: &Value) -> Vec<String> {
    let mut out = BTreeSet::new();
    collect_refs(value, &mut out);
    out.into_iter().collect()
}

/// Package a snapshot for submission.
pub fn build_submission(values: ValueMap) -> SubmissionPayload {
    let attachment_refs = extract_attachment_refs(&Value::Object(values.clone()));
    SubmissionPayload {
        values,
        attachment_refs,
    }
}
