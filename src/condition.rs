//! Condition evaluation
//!
//! One comparison (operator + expected + actual) and one compound rule
//! (primary condition plus AND/OR-combined extras). Malformed rule input
//! never raises: unknown operators and non-array `in`/`not_in` expected
//! values evaluate to false.

use crate::context::{value_is_empty, ValueContext};
use crate::schema::{Comparison, Condition, ConditionLogic, ConditionOperator};
use serde_json::Value;
use tracing::debug;

/// Evaluate a single comparison. `expected` comes from the rule, `actual`
/// from the value context.
pub fn evaluate_comparison(
    operator: ConditionOperator,
    expected: Option<&Value>,
    actual: Option<&Value>,
) -> bool {
    match operator {
        ConditionOperator::Equals => match (expected, actual) {
            (Some(e), Some(a)) => e == a,
            _ => false,
        },
        // An absent actual is unequal to any present expected value, so
        // "not_equals approved" fires on a field the user has not touched
        // yet. Equality still requires both sides present.
        ConditionOperator::NotEquals => match (expected, actual) {
            (Some(e), Some(a)) => e != a,
            (Some(_), None) => true,
            _ => false,
        },
        // Membership requires an array on the rule side; anything else is a
        // malformed rule and matches neither polarity.
        ConditionOperator::In => match expected {
            Some(Value::Array(items)) => actual.map(|a| items.contains(a)).unwrap_or(false),
            _ => false,
        },
        ConditionOperator::NotIn => match expected {
            Some(Value::Array(items)) => actual.map(|a| !items.contains(a)).unwrap_or(false),
            _ => false,
        },
        ConditionOperator::IsEmpty => value_is_empty(actual),
        ConditionOperator::IsNotEmpty => !value_is_empty(actual),
        ConditionOperator::Unknown => false,
    }
}

fn evaluate_extra(cmp: &Comparison, ctx: &ValueContext<'_>) -> bool {
    evaluate_comparison(cmp.operator, cmp.value.as_ref(), ctx.get(&cmp.field_key))
}

/// Evaluate a compound condition: primary comparison plus any extras,
/// reduced with the rule's AND/OR logic (default AND).
pub fn evaluate_rule(condition: &Condition, ctx: &ValueContext<'_>) -> bool {
    let primary = evaluate_comparison(
        condition.operator,
        condition.value.as_ref(),
        ctx.get(&condition.field_key),
    );

    if condition.conditions.is_empty() {
        return primary;
    }

    let matched = match condition.logic {
        ConditionLogic::And => primary && condition.conditions.iter().all(|c| evaluate_extra(c, ctx)),
        ConditionLogic::Or => primary || condition.conditions.iter().any(|c| evaluate_extra(c, ctx)),
    };
    if matched {
        debug!(field_key = %condition.field_key, "compound condition matched");
    }
    matched
}
