//! Operator catalog: the comparisons each field type allows.

use serde::{Deserialize, Serialize};

use crate::fields::FieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterThanEquals,
    LessThanEquals,
    Before,
    After,
    Between,
}

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Contains,
    Operator::NotContains,
    Operator::StartsWith,
    Operator::EndsWith,
];

const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::GreaterThanEquals,
    Operator::LessThanEquals,
    Operator::Between,
];

const DATE_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Before,
    Operator::After,
    Operator::Between,
];

const EQUALITY_OPERATORS: &[Operator] = &[Operator::Equals, Operator::NotEquals];

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanEquals,
        Operator::LessThanEquals,
        Operator::Before,
        Operator::After,
        Operator::Between,
    ];

    /// Stable identifier used in serialized segments.
    pub fn id(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterThanEquals => "greater_than_equals",
            Operator::LessThanEquals => "less_than_equals",
            Operator::Before => "before",
            Operator::After => "after",
            Operator::Between => "between",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operator::Equals => "Equals",
            Operator::NotEquals => "Does not equal",
            Operator::Contains => "Contains",
            Operator::NotContains => "Does not contain",
            Operator::StartsWith => "Starts with",
            Operator::EndsWith => "Ends with",
            Operator::GreaterThan => "Greater than",
            Operator::LessThan => "Less than",
            Operator::GreaterThanEquals => "Greater than or equal",
            Operator::LessThanEquals => "Less than or equal",
            Operator::Before => "Before",
            Operator::After => "After",
            Operator::Between => "Between",
        }
    }

    pub fn from_id(id: &str) -> Option<Operator> {
        Operator::ALL.iter().copied().find(|op| op.id() == id)
    }

    pub fn is_between(&self) -> bool {
        matches!(self, Operator::Between)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Ordered operator list for a field type. The head is the default
/// operator assigned when a field of that type is selected.
pub fn operators_for_type(field_type: &FieldType) -> &'static [Operator] {
    match field_type {
        FieldType::Text => TEXT_OPERATORS,
        FieldType::Number => NUMBER_OPERATORS,
        FieldType::Date => DATE_OPERATORS,
        FieldType::Boolean | FieldType::Select { .. } => EQUALITY_OPERATORS,
    }
}

pub fn default_operator(field_type: &FieldType) -> Operator {
    operators_for_type(field_type)[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::SelectOption;

    fn all_types() -> Vec<FieldType> {
        vec![
            FieldType::Text,
            FieldType::Number,
            FieldType::Date,
            FieldType::Boolean,
            FieldType::Select {
                options: vec![SelectOption::new("gold", "Gold")],
            },
        ]
    }

    #[test]
    fn test_every_type_has_operators() {
        for ty in all_types() {
            let ops = operators_for_type(&ty);
            assert!(!ops.is_empty());
            assert_eq!(default_operator(&ty), ops[0]);
        }
    }

    #[test]
    fn test_ids_round_trip_through_catalog() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_id(op.id()), Some(op));
        }
        assert_eq!(Operator::from_id("regex"), None);
    }

    #[test]
    fn test_between_only_for_ordered_types() {
        assert!(operators_for_type(&FieldType::Number).contains(&Operator::Between));
        assert!(operators_for_type(&FieldType::Date).contains(&Operator::Between));
        assert!(!operators_for_type(&FieldType::Text).contains(&Operator::Between));
        assert!(!operators_for_type(&FieldType::Boolean).contains(&Operator::Between));
    }

    #[test]
    fn test_serde_matches_id() {
        let json = serde_json::to_string(&Operator::GreaterThanEquals).unwrap();
        assert_eq!(json, "\"greater_than_equals\"");
    }
}
