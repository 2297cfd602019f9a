//! Segment builder: fluent API for composing segment expressions.

use crate::condition::FilterCondition;
use crate::error::{SegmentError, SegmentResult};
use crate::expression::SegmentExpression;
use crate::fields::FieldRegistry;
use crate::operators::Operator;
use crate::value::TypedValue;

/// Drives the composer step by step. Conditions go into the most recently
/// opened group; the first failing step is reported by [`build`].
///
/// [`build`]: SegmentBuilder::build
pub struct SegmentBuilder<'a> {
    registry: &'a FieldRegistry,
    expression: SegmentExpression,
    error: Option<SegmentError>,
}

impl<'a> SegmentBuilder<'a> {
    pub fn new(registry: &'a FieldRegistry) -> Self {
        Self {
            registry,
            expression: SegmentExpression::new(),
            error: None,
        }
    }

    pub fn condition(self, field_id: &str, operator: Operator, value: TypedValue) -> Self {
        self.step(|expr, registry| {
            let condition = FilterCondition::new(registry, field_id)?
                .with_operator(registry, operator)?
                .with_value(registry, value)?;
            expr.push_condition(expr.last_group_id(), condition)
        })
    }

    pub fn equals(self, field_id: &str, value: TypedValue) -> Self {
        self.condition(field_id, Operator::Equals, value)
    }

    pub fn contains(self, field_id: &str, text: impl Into<String>) -> Self {
        self.condition(field_id, Operator::Contains, TypedValue::text(text))
    }

    pub fn between(self, field_id: &str, low: TypedValue, high: TypedValue) -> Self {
        self.step(|expr, registry| {
            let condition = FilterCondition::new(registry, field_id)?
                .with_operator(registry, Operator::Between)?
                .with_value(registry, low)?
                .with_second_value(registry, high)?;
            expr.push_condition(expr.last_group_id(), condition)
        })
    }

    /// Opens a group joined to everything before it with AND.
    pub fn and_group(self) -> Self {
        self.step(|expr, _| {
            let next = expr.add_group();
            next.toggle_combinator(next.last_group_id())
        })
    }

    /// Opens a group joined to everything before it with OR.
    pub fn or_group(self) -> Self {
        self.step(|expr, _| Ok(expr.add_group()))
    }

    pub fn build(self) -> SegmentResult<SegmentExpression> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.expression),
        }
    }

    fn step<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&SegmentExpression, &FieldRegistry) -> SegmentResult<SegmentExpression>,
    {
        if self.error.is_none() {
            match f(&self.expression, self.registry) {
                Ok(next) => self.expression = next,
                Err(err) => self.error = Some(err),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Combinator;

    #[test]
    fn test_builds_grouped_expression() {
        let registry = FieldRegistry::crm_default();
        let expr = SegmentBuilder::new(&registry)
            .contains("email", "@gmail.")
            .equals("isSubscribed", TypedValue::boolean(true))
            .and_group()
            .between("orderCount", TypedValue::number(1.0), TypedValue::number(5.0))
            .or_group()
            .equals("tier", TypedValue::text("gold"))
            .build()
            .unwrap();

        let groups = expr.groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].combinator(), Combinator::And);
        assert_eq!(groups[2].combinator(), Combinator::Or);
        assert_eq!(groups[2].conditions().next().unwrap().field_id(), "tier");
    }

    #[test]
    fn test_first_error_wins() {
        let registry = FieldRegistry::crm_default();
        let result = SegmentBuilder::new(&registry)
            .condition("name", Operator::Before, TypedValue::text("x"))
            .equals("nope", TypedValue::text("x"))
            .build();
        assert!(matches!(
            result,
            Err(SegmentError::OperatorNotAllowedForField { .. })
        ));
    }
}
