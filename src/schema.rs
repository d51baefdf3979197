//! Schema model - fields, sections, conditional rules
//!
//! All schema structures are authored externally and treated as immutable
//! inputs; the engine only reads them. Rule lists are ordered and evaluated
//! first-match-wins, so they are kept as plain `Vec`s, never re-sorted or
//! deduplicated.

use crate::{FormsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Snapshot keys starting with this prefix hold repeating-section row data
/// rather than a field value.
pub const SECTION_DATA_PREFIX: &str = "__section_";

/// String values starting with this prefix are attachment references and are
/// collected into the submission's attachment side channel.
pub const ATTACHMENT_PREFIX: &str = "ATT-";

/// Snapshot key under which a repeating section stores its rows.
pub fn section_data_key(section_id: &str) -> String {
    format!("{}{}", SECTION_DATA_PREFIX, section_id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Multiselect,
    Checkbox,
    File,
    UserSelect,
}

impl FieldType {
    pub fn is_select(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Multiselect)
    }
}

/// One typed, labeled unit of user input in a dynamic schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    /// Unique within the schema.
    pub key: String,
    pub label: String,
    pub field_type: FieldType,
    /// Static requiredness; conditional rules may override it.
    #[serde(default)]
    pub required: bool,
    /// Present only for SELECT / MULTISELECT.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub validation: Option<FieldValidation>,
    /// Absent = ungrouped.
    #[serde(default)]
    pub section_id: Option<String>,
    /// Ordered; first matching rule wins.
    #[serde(default)]
    pub conditional_requirements: Vec<ConditionalRule>,
}

/// Shape constraints for a field value. Length bounds apply to text types,
/// numeric bounds to NUMBER, the date policy to DATE.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub date_validation: Option<DateRangeSettings>,
}

/// Which calendar ranges a DATE field accepts. A matching conditional
/// rule's settings replace these wholesale, so absent flags deserialize to
/// `true` rather than inheriting the static value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeSettings {
    #[serde(default = "default_true")]
    pub allow_past: bool,
    #[serde(default = "default_true")]
    pub allow_today: bool,
    #[serde(default = "default_true")]
    pub allow_future: bool,
}

impl Default for DateRangeSettings {
    fn default() -> Self {
        Self {
            allow_past: true,
            allow_today: true,
            allow_future: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A named grouping of fields, optionally repeating.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_repeating: bool,
    /// Meaningful only if repeating.
    #[serde(default)]
    pub min_rows: Option<u32>,
    #[serde(default)]
    pub max_rows: Option<u32>,
    #[serde(default)]
    pub order: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
    /// Operators this engine does not recognize; always evaluate false.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

/// One comparison against another field's value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comparison {
    pub field_key: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Compound condition: a primary comparison plus optional extras combined
/// with AND/OR.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Condition {
    pub field_key: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub conditions: Vec<Comparison>,
    #[serde(default)]
    pub logic: ConditionLogic,
}

/// What a matched rule imposes on the field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub required: bool,
    #[serde(default)]
    pub date_validation: Option<DateRangeSettings>,
}

/// Overrides a field's static required/date-constraint state when a
/// condition over other field values holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub when: Condition,
    pub then: RuleOutcome,
}

/// Authoring-time integrity check. Schemas that fail here must be rejected
/// before reaching the engine; the validators assume it has passed.
pub fn check_schema(fields: &[Field], sections: &[Section]) -> Result<()> {
    let section_ids: HashSet<&str> = sections.iter().map(|s| s.id.as_str()).collect();
    let mut seen = HashSet::new();

    for field in fields {
        if !seen.insert(field.key.as_str()) {
            return Err(FormsError::DuplicateFieldKey(field.key.clone()));
        }
        if let Some(ref sid) = field.section_id {
            if !section_ids.contains(sid.as_str()) {
                return Err(FormsError::UnknownSection {
                    field: field.key.clone(),
                    section_id: sid.clone(),
                });
            }
        }
        if field.options.is_some() && !field.field_type.is_select() {
            return Err(FormsError::UnexpectedOptions(field.key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(key: &str, field_type: FieldType) -> Field {
        Field {
            key: key.into(),
            label: key.to_uppercase(),
            field_type,
            required: false,
            options: None,
            validation: None,
            section_id: None,
            conditional_requirements: vec![],
        }
    }

    #[test]
    fn test_check_schema_accepts_valid() {
        let sections = vec![Section {
            id: "s1".into(),
            title: "Details".into(),
            is_repeating: false,
            min_rows: None,
            max_rows: None,
            order: 0,
        }];
        let mut f = field("name", FieldType::Text);
        f.section_id = Some("s1".into());
        assert!(check_schema(&[f, field("age", FieldType::Number)], &sections).is_ok());
    }

    #[test]
    fn test_check_schema_rejects_duplicate_keys() {
        let fields = vec![field("name", FieldType::Text), field("name", FieldType::Text)];
        assert!(matches!(
            check_schema(&fields, &[]),
            Err(FormsError::DuplicateFieldKey(_))
        ));
    }

    #[test]
    fn test_check_schema_rejects_dangling_section() {
        let mut f = field("name", FieldType::Text);
        f.section_id = Some("missing".into());
        assert!(matches!(
            check_schema(&[f], &[]),
            Err(FormsError::UnknownSection { .. })
        ));
    }

    #[test]
    fn test_check_schema_rejects_options_on_text() {
        let mut f = field("name", FieldType::Text);
        f.options = Some(vec!["a".into()]);
        assert!(matches!(
            check_schema(&[f], &[]),
            Err(FormsError::UnexpectedOptions(_))
        ));
    }

    #[test]
    fn test_unknown_operator_deserializes() {
        let op: ConditionOperator = serde_json::from_str("\"matches_glob\"").unwrap();
        assert_eq!(op, ConditionOperator::Unknown);
    }

    #[test]
    fn test_date_settings_partial_deserialize_defaults_true() {
        let s: DateRangeSettings = serde_json::from_str(r#"{"allow_future": false}"#).unwrap();
        assert!(s.allow_past);
        assert!(s.allow_today);
        assert!(!s.allow_future);
    }
}
