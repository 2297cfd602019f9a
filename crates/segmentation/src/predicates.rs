//! Comparison logic for a single operator against a single attribute.

use std::cmp::Ordering;

use crate::fields::FieldKind;
use crate::operators::Operator;
use crate::value::TypedValue;

/// Compares a record attribute with a condition's value(s). Any tag that
/// disagrees with `kind` yields `false`.
pub fn matches_value(
    kind: FieldKind,
    operator: Operator,
    actual: &TypedValue,
    value: &TypedValue,
    second: Option<&TypedValue>,
) -> bool {
    match (kind, actual, value) {
        (FieldKind::Text, TypedValue::Text(a), TypedValue::Text(e)) => compare_text(operator, a, e),
        (FieldKind::Select, TypedValue::Text(a), TypedValue::Text(e)) => compare_equality(operator, a == e),
        (FieldKind::Boolean, TypedValue::Boolean(a), TypedValue::Boolean(e)) => {
            compare_equality(operator, a == e)
        }
        (FieldKind::Number, TypedValue::Number(a), TypedValue::Number(lo)) => {
            if operator.is_between() {
                match second {
                    Some(TypedValue::Number(hi)) => in_range(number_cmp(*a, *lo), number_cmp(*a, *hi)),
                    _ => false,
                }
            } else {
                compare_ordering(operator, number_cmp(*a, *lo))
            }
        }
        (FieldKind::Date, TypedValue::Date(a), TypedValue::Date(lo)) => {
            if operator.is_between() {
                match second {
                    Some(TypedValue::Date(hi)) => in_range(a.cmp(lo), a.cmp(hi)),
                    _ => false,
                }
            } else {
                compare_ordering(operator, a.cmp(lo))
            }
        }
        _ => false,
    }
}

/// Total order on numbers with both zeros folded together, so `-0.0`
/// equals `0`.
fn number_cmp(a: f64, b: f64) -> Ordering {
    (a + 0.0).total_cmp(&(b + 0.0))
}

/// Case-insensitive text comparison on lower-cased forms of both sides.
pub fn compare_text(operator: Operator, actual: &str, expected: &str) -> bool {
    let actual = actual.to_lowercase();
    let expected = expected.to_lowercase();
    match operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        Operator::Contains => actual.contains(&expected),
        Operator::NotContains => !actual.contains(&expected),
        Operator::StartsWith => actual.starts_with(&expected),
        Operator::EndsWith => actual.ends_with(&expected),
        _ => false,
    }
}

fn compare_equality(operator: Operator, equal: bool) -> bool {
    match operator {
        Operator::Equals => equal,
        Operator::NotEquals => !equal,
        _ => false,
    }
}

/// `ordering` is the record value compared with the condition value.
fn compare_ordering(operator: Operator, ordering: Ordering) -> bool {
    match operator {
        Operator::Equals => ordering.is_eq(),
        Operator::NotEquals => ordering.is_ne(),
        Operator::GreaterThan | Operator::After => ordering.is_gt(),
        Operator::LessThan | Operator::Before => ordering.is_lt(),
        Operator::GreaterThanEquals => ordering.is_ge(),
        Operator::LessThanEquals => ordering.is_le(),
        _ => false,
    }
}

/// Inclusive on both ends; an inverted range can never hold.
fn in_range(vs_low: Ordering, vs_high: Ordering) -> bool {
    vs_low.is_ge() && vs_high.is_le()
}
