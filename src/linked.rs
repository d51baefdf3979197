//! Linked rows - completing a field set once per source row
//!
//! A linked task carries rows produced by another workflow step's repeating
//! section. Each source row contributes read-only provenance (what the
//! originating row contained) and an independent editable value slice for
//! the current step's field set. Validation follows the repeating-section
//! per-row contract; there is no min/max-row policy because the row count
//! is fixed by the source.

use crate::context::{ValueContext, ValueMap};
use crate::schema::Field;
use crate::section::check_row_fields;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Read-only display of one value from the originating row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceValue {
    pub value: Value,
    pub label: String,
}

/// One row handed over from the source step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedSourceRow {
    pub source_row_index: usize,
    pub provenance: BTreeMap<String, ProvenanceValue>,
}

/// Where the linked rows came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedSourceInfo {
    pub source_step_id: String,
    pub source_section_id: String,
    pub total_rows: usize,
}

/// A source row paired with its editable value slice.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedRowContext {
    pub source_row_index: usize,
    pub provenance: BTreeMap<String, ProvenanceValue>,
    /// Values edited in this step, keyed by the shared field set.
    pub values: ValueMap,
}

/// Wire contract for submitting a completed linked task.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedTaskPayload {
    pub is_linked_task: bool,
    pub linked_source_info: LinkedSourceInfo,
    pub linked_rows: Vec<LinkedRowContext>,
}

/// Pair every source row with its editable slice. Missing slices (rows the
/// user has not touched yet) materialize empty, so each row stays
/// independent of its siblings.
pub fn materialize_rows(
    source_rows: &[LinkedSourceRow],
    edited_rows: &[ValueMap],
) -> Vec<LinkedRowContext> {
    source_rows
        .iter()
        .enumerate()
        .map(|(i, src)| LinkedRowContext {
            source_row_index: src.source_row_index,
            provenance: src.provenance.clone(),
            values: edited_rows.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Composite key for one field in one linked row.
pub fn linked_error_key(source_row_index: usize, field_key: &str) -> String {
    format!("linked::{}::{}", source_row_index, field_key)
}

/// Validate every materialized row against the shared field set. `globals`
/// is the outer form snapshot; each row's edited values shadow it for
/// conditional evaluation, exactly as in repeating sections.
pub fn validate_linked_rows(
    fields: &[Field],
    rows: &[LinkedRowContext],
    globals: &ValueMap,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for (position, row) in rows.iter().enumerate() {
        let ctx = ValueContext::with_row(globals, &row.values);
        check_row_fields(fields.iter(), &row.values, &ctx, position, |field_key, msg| {
            errors.insert(linked_error_key(row.source_row_index, field_key), msg);
        });
    }
    errors
}

/// Package validated rows for the external submission API.
pub fn build_linked_payload(
    info: LinkedSourceInfo,
    rows: Vec<LinkedRowContext>,
) -> LinkedTaskPayload {
    LinkedTaskPayload {
        is_linked_task: true,
        linked_source_info: info,
        linked_rows: rows,
    }
}

/// Linked completion payload plus the attachment side channel, mirroring
/// [`SubmissionPayload`](crate::submission::SubmissionPayload) for
/// non-linked forms.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedSubmission {
    #[serde(flatten)]
    pub payload: LinkedTaskPayload,
    pub attachment_refs: Vec<String>,
}

/// Package validated rows with the attachment references found anywhere in
/// their edited values or provenance. The scan is structural and never
/// fails; rows without references yield an empty list.
pub fn build_linked_submission(
    info: LinkedSourceInfo,
    rows: Vec<LinkedRowContext>,
) -> LinkedSubmission {
    let payload = build_linked_payload(info, rows);
    let mut refs = std::collections::BTreeSet::new();
    for row in &payload.linked_rows {
        for value in row.values.values() {
            crate::submission::collect_refs(value, &mut refs);
        }
        for prov in row.provenance.values() {
            crate::submission::collect_refs(&prov.value, &mut refs);
        }
    }
    LinkedSubmission {
        payload,
        attachment_refs: refs.into_iter().collect(),
    }
}
