//! Flowdesk Dynamic Form Rule Engine
//!
//! Evaluates conditional business rules over a runtime-defined form schema,
//! validates field values (including repeating rows and cross-step linked
//! rows), and computes structural diffs between two snapshots of the same
//! dynamic schema for review/approval workflows.
//!
//! ## Features
//! - Conditional requirements (first-match-wins rule lists)
//! - Shape validation (length, pattern, numeric bounds)
//! - Repeating sections with per-row rule context
//! - Linked rows materialized from another step's output
//! - Field-, row-, and attachment-level version diffs
//!
//! Every operation is synchronous and pure: the caller passes a schema and
//! an immutable value snapshot, the engine returns data. Validation
//! problems are reported as key/message mappings, never as errors;
//! `FormsError` is reserved for schema integrity violations.

use thiserror::Error;

pub mod condition;
pub mod context;
pub mod diff;
pub mod linked;
pub mod requirement;
pub mod schema;
pub mod section;
pub mod submission;
pub mod validate;

pub use condition::{evaluate_comparison, evaluate_rule};
pub use context::{value_as_f64, value_is_empty, ValueContext, ValueMap};
pub use diff::{
    diff_attachments, diff_fields, diff_repeating_rows, flatten, flatten_tagged,
    AttachmentAction, AttachmentChange, FieldChange, FlatField, FormVersion, RepeatingRowsDelta,
    RowChange, ROOT_STEP_ID,
};
pub use linked::{
    build_linked_payload, build_linked_submission, materialize_rows, validate_linked_rows,
    LinkedRowContext, LinkedSourceInfo, LinkedSourceRow, LinkedSubmission, LinkedTaskPayload,
    ProvenanceValue,
};
pub use requirement::{date_bounds, date_bounds_now, resolve_date_settings, resolve_requirement};
pub use schema::{
    check_schema, section_data_key, Comparison, Condition, ConditionLogic, ConditionOperator,
    ConditionalRule, DateRangeSettings, Field, FieldType, FieldValidation, RuleOutcome, Section,
    ATTACHMENT_PREFIX, SECTION_DATA_PREFIX,
};
pub use section::validate_form;
pub use submission::{build_submission, extract_attachment_refs, Draft, SubmissionPayload};
pub use validate::validate_value;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum FormsError {
    #[error("duplicate field key: {0}")]
    DuplicateFieldKey(String),

    #[error("field {field} references unknown section {section_id}")]
    UnknownSection { field: String, section_id: String },

    #[error("field {0} carries options but is not a select type")]
    UnexpectedOptions(String),
}

pub type Result<T> = std::result::Result<T, FormsError>;
