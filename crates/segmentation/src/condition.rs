//! Filter conditions: one typed predicate over one customer field.
//!
//! Every transformation returns a new condition. Values are checked
//! against the field definition when they enter the condition, so the
//! evaluator never has to re-validate tags.

use uuid::Uuid;

use crate::error::{SegmentError, SegmentResult};
use crate::fields::{FieldDefinition, FieldKind, FieldRegistry};
use crate::operators::Operator;
use crate::value::TypedValue;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    id: Uuid,
    field_id: String,
    field_kind: FieldKind,
    operator: Operator,
    value: Option<TypedValue>,
    second_value: Option<TypedValue>,
}

impl FilterCondition {
    /// A fresh condition on `field_id` using the field type's default
    /// operator and no value.
    pub fn new(registry: &FieldRegistry, field_id: &str) -> SegmentResult<Self> {
        let field = registry.get_field(field_id)?;
        Ok(Self {
            id: Uuid::new_v4(),
            field_id: field.id.clone(),
            field_kind: field.field_type.kind(),
            operator: field.default_operator(),
            value: None,
            second_value: None,
        })
    }

    /// Rebuilds a condition from stored parts, enforcing every invariant
    /// that the editing operations enforce.
    pub(crate) fn from_parts(
        registry: &FieldRegistry,
        id: Uuid,
        field_id: &str,
        operator: Operator,
        value: Option<TypedValue>,
        second_value: Option<TypedValue>,
    ) -> SegmentResult<Self> {
        let field = registry.get_field(field_id)?;
        ensure_allowed(field, operator)?;
        if let Some(v) = &value {
            field.check_value(v)?;
        }
        if let Some(v) = &second_value {
            if !operator.is_between() {
                return Err(SegmentError::SecondValueNotAllowed(operator));
            }
            field.check_value(v)?;
        }
        Ok(Self {
            id,
            field_id: field.id.clone(),
            field_kind: field.field_type.kind(),
            operator,
            value,
            second_value,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Kind of the field this condition was built against.
    pub fn field_kind(&self) -> FieldKind {
        self.field_kind
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> Option<&TypedValue> {
        self.value.as_ref()
    }

    pub fn second_value(&self) -> Option<&TypedValue> {
        self.second_value.as_ref()
    }

    /// Switch to another field. The operator resets to the new field's
    /// default and both values are cleared, even when the types agree.
    pub fn with_field(&self, registry: &FieldRegistry, field_id: &str) -> SegmentResult<Self> {
        let field = registry.get_field(field_id)?;
        Ok(Self {
            id: self.id,
            field_id: field.id.clone(),
            field_kind: field.field_type.kind(),
            operator: field.default_operator(),
            value: None,
            second_value: None,
        })
    }

    pub fn with_operator(&self, registry: &FieldRegistry, operator: Operator) -> SegmentResult<Self> {
        let field = registry.get_field(&self.field_id)?;
        ensure_allowed(field, operator)?;
        let second_value = if operator.is_between() {
            self.second_value.clone()
        } else {
            None
        };
        Ok(Self {
            operator,
            second_value,
            ..self.clone()
        })
    }

    pub fn with_operator_id(&self, registry: &FieldRegistry, operator_id: &str) -> SegmentResult<Self> {
        let operator = Operator::from_id(operator_id)
            .ok_or_else(|| SegmentError::UnknownOperator(operator_id.to_string()))?;
        self.with_operator(registry, operator)
    }

    pub fn with_value(&self, registry: &FieldRegistry, value: TypedValue) -> SegmentResult<Self> {
        registry.get_field(&self.field_id)?.check_value(&value)?;
        Ok(Self {
            value: Some(value),
            ..self.clone()
        })
    }

    /// Upper bound of a `between` range.
    pub fn with_second_value(&self, registry: &FieldRegistry, value: TypedValue) -> SegmentResult<Self> {
        if !self.operator.is_between() {
            return Err(SegmentError::SecondValueNotAllowed(self.operator));
        }
        registry.get_field(&self.field_id)?.check_value(&value)?;
        Ok(Self {
            second_value: Some(value),
            ..self.clone()
        })
    }

    /// Whether every value the operator needs has been supplied.
    pub fn is_complete(&self) -> bool {
        self.value.is_some() && (!self.operator.is_between() || self.second_value.is_some())
    }

    /// A `between` whose lower bound exceeds its upper bound. Such a
    /// condition matches nothing; callers may surface this as a notice.
    pub fn is_empty_range(&self) -> bool {
        if !self.operator.is_between() {
            return false;
        }
        match (&self.value, &self.second_value) {
            (Some(TypedValue::Number(lo)), Some(TypedValue::Number(hi))) => lo.total_cmp(hi).is_gt(),
            (Some(TypedValue::Date(lo)), Some(TypedValue::Date(hi))) => lo > hi,
            _ => false,
        }
    }
}

fn ensure_allowed(field: &FieldDefinition, operator: Operator) -> SegmentResult<()> {
    if field.allows(operator) {
        Ok(())
    } else {
        Err(SegmentError::OperatorNotAllowedForField {
            field: field.id.clone(),
            operator: operator.id().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FieldRegistry {
        FieldRegistry::crm_default()
    }

    #[test]
    fn test_new_condition_uses_default_operator() {
        let registry = registry();
        for field in registry.fields() {
            let cond = FilterCondition::new(&registry, &field.id).unwrap();
            assert_eq!(cond.operator(), registry.operators_for(&field.id).unwrap()[0]);
            assert!(cond.value().is_none());
            assert!(cond.second_value().is_none());
        }
    }

    #[test]
    fn test_set_field_resets_operator_and_values() {
        let registry = registry();
        let cond = FilterCondition::new(&registry, "orderCount")
            .unwrap()
            .with_operator(&registry, Operator::Between)
            .unwrap()
            .with_value(&registry, TypedValue::number(10.0))
            .unwrap()
            .with_second_value(&registry, TypedValue::number(20.0))
            .unwrap();

        // Same type, values still cleared.
        let moved = cond.with_field(&registry, "totalSpent").unwrap();
        assert_eq!(moved.id(), cond.id());
        assert_eq!(moved.field_id(), "totalSpent");
        assert_eq!(moved.operator(), Operator::Equals);
        assert!(moved.value().is_none());
        assert!(moved.second_value().is_none());

        let text = cond.with_field(&registry, "name").unwrap();
        assert_eq!(text.operator(), Operator::Equals);
        assert!(text.value().is_none());
    }

    #[test]
    fn test_operator_must_belong_to_field_type() {
        let registry = registry();
        let cond = FilterCondition::new(&registry, "name").unwrap();
        assert!(matches!(
            cond.with_operator(&registry, Operator::GreaterThan),
            Err(SegmentError::OperatorNotAllowedForField { .. })
        ));
        assert!(matches!(
            cond.with_operator_id(&registry, "fuzzy"),
            Err(SegmentError::UnknownOperator(_))
        ));
        let cond = cond.with_operator_id(&registry, "contains").unwrap();
        assert_eq!(cond.operator(), Operator::Contains);
    }

    #[test]
    fn test_leaving_between_clears_second_value() {
        let registry = registry();
        let cond = FilterCondition::new(&registry, "age")
            .unwrap()
            .with_operator(&registry, Operator::Between)
            .unwrap();
        // Entering between leaves the upper bound empty.
        assert!(cond.second_value().is_none());
        assert!(!cond.is_complete());

        let cond = cond
            .with_value(&registry, TypedValue::number(18.0))
            .unwrap()
            .with_second_value(&registry, TypedValue::number(30.0))
            .unwrap();
        assert!(cond.is_complete());

        let cond = cond.with_operator(&registry, Operator::GreaterThan).unwrap();
        assert!(cond.second_value().is_none());
        assert_eq!(cond.value(), Some(&TypedValue::number(18.0)));
    }

    #[test]
    fn test_values_must_match_field_type() {
        let registry = registry();
        let cond = FilterCondition::new(&registry, "isSubscribed").unwrap();
        assert!(matches!(
            cond.with_value(&registry, TypedValue::text("yes")),
            Err(SegmentError::TypeMismatch { .. })
        ));
        assert!(cond.with_value(&registry, TypedValue::boolean(true)).is_ok());
        assert!(matches!(
            cond.with_second_value(&registry, TypedValue::boolean(false)),
            Err(SegmentError::SecondValueNotAllowed(Operator::Equals))
        ));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let registry = registry();
        let cond = FilterCondition::new(&registry, "totalSpent")
            .unwrap()
            .with_operator(&registry, Operator::Between)
            .unwrap();
        assert!(matches!(
            cond.with_value(&registry, TypedValue::number(f64::NAN)),
            Err(SegmentError::NonFiniteNumber { .. })
        ));
        assert!(matches!(
            cond.with_second_value(&registry, TypedValue::number(f64::INFINITY)),
            Err(SegmentError::NonFiniteNumber { .. })
        ));
    }

    #[test]
    fn test_empty_range_detection() {
        let registry = registry();
        let cond = FilterCondition::new(&registry, "orderCount")
            .unwrap()
            .with_operator(&registry, Operator::Between)
            .unwrap()
            .with_value(&registry, TypedValue::number(20.0))
            .unwrap()
            .with_second_value(&registry, TypedValue::number(10.0))
            .unwrap();
        assert!(cond.is_empty_range());
    }
}
