//! Requirement resolution
//!
//! Turns a field's static requiredness plus its ordered conditional rules
//! into the effective requiredness and date-range constraints for one value
//! context. Rule lists are first-match-wins: iteration stops at the first
//! rule whose condition holds.

use crate::condition::evaluate_rule;
use crate::context::ValueContext;
use crate::schema::{DateRangeSettings, Field};
use chrono::{Duration, NaiveDate, Utc};
use tracing::debug;

/// Effective requiredness: the first matching rule's outcome, or the
/// field's static flag when no rule matches.
pub fn resolve_requirement(field: &Field, ctx: &ValueContext<'_>) -> bool {
    for rule in &field.conditional_requirements {
        if evaluate_rule(&rule.when, ctx) {
            debug!(field = %field.key, required = rule.then.required, "conditional requirement matched");
            return rule.then.required;
        }
    }
    field.required
}

/// Effective date-range settings. The first matching rule that carries a
/// `date_validation` replaces the static settings wholesale (no merge); a
/// matching rule without one leaves the scan running. No match means the
/// static settings (or all-true defaults) stand.
pub fn resolve_date_settings(field: &Field, ctx: &ValueContext<'_>) -> DateRangeSettings {
    let static_settings = field
        .validation
        .as_ref()
        .and_then(|v| v.date_validation)
        .unwrap_or_default();

    for rule in &field.conditional_requirements {
        if evaluate_rule(&rule.when, ctx) {
            if let Some(settings) = rule.then.date_validation {
                return settings;
            }
        }
    }
    static_settings
}

/// Translate settings into inclusive calendar bounds relative to `today`.
///
/// `allow_past = false` moves the lower bound to today (tomorrow when today
/// is also disallowed); `allow_future = false` moves the upper bound to
/// today (yesterday when today is also disallowed). Disallowing both past
/// and future while allowing today pins both bounds to today.
pub fn date_bounds(
    settings: DateRangeSettings,
    today: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let min = if !settings.allow_past {
        Some(if settings.allow_today {
            today
        } else {
            today + Duration::days(1)
        })
    } else {
        None
    };
    let max = if !settings.allow_future {
        Some(if settings.allow_today {
            today
        } else {
            today - Duration::days(1)
        })
    } else {
        None
    };
    (min, max)
}

/// `date_bounds` anchored at the current UTC date.
pub fn date_bounds_now(settings: DateRangeSettings) -> (Option<NaiveDate>, Option<NaiveDate>) {
    date_bounds(settings, Utc::now().date_naive())
}
