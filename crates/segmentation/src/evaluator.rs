//! Evaluation of segment expressions against customer records.
//!
//! Missing data policy: a condition whose field is absent from the record
//! evaluates to `false` for every operator, negated operators included.
//! Absence is never taken as evidence of inequality. Incomplete conditions
//! (no value, or a `between` without an upper bound) and quarantined
//! conditions evaluate to `false` as well.
//!
//! Groups combine left to right: the first group seeds the result and each
//! later group is folded in with its own combinator. With three or more
//! groups the grouping is therefore `((g1 op2 g2) op3 g3) ...`.

use serde::{Deserialize, Serialize};

use crate::condition::FilterCondition;
use crate::expression::{Combinator, ConditionEntry, FilterGroup, SegmentExpression};
use crate::predicates;
use crate::record::CustomerRecord;

pub fn evaluate_condition(condition: &FilterCondition, record: &CustomerRecord) -> bool {
    let Some(actual) = record.get(condition.field_id()) else {
        return false;
    };
    let Some(value) = condition.value() else {
        return false;
    };
    predicates::matches_value(
        condition.field_kind(),
        condition.operator(),
        actual,
        value,
        condition.second_value(),
    )
}

pub fn evaluate_entry(entry: &ConditionEntry, record: &CustomerRecord) -> bool {
    match entry {
        ConditionEntry::Active(condition) => evaluate_condition(condition, record),
        ConditionEntry::Quarantined(_) => false,
    }
}

/// All conditions must hold. An empty group is vacuously true.
pub fn evaluate_group(group: &FilterGroup, record: &CustomerRecord) -> bool {
    group.entries().iter().all(|e| evaluate_entry(e, record))
}

pub fn evaluate_expression(expression: &SegmentExpression, record: &CustomerRecord) -> bool {
    let (first, rest) = match expression.groups().split_first() {
        Some(split) => split,
        None => return true,
    };
    rest.iter()
        .fold(evaluate_group(first, record), |acc, group| match group.combinator() {
            Combinator::And => acc && evaluate_group(group, record),
            Combinator::Or => acc || evaluate_group(group, record),
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationResult {
    pub evaluated: usize,
    pub match_count: usize,
    /// Customer ids in the order the records were supplied.
    pub matching_ids: Vec<String>,
}

impl PopulationResult {
    /// Appends the result of a later chunk.
    pub fn merge(mut self, later: PopulationResult) -> Self {
        self.evaluated += later.evaluated;
        self.match_count += later.match_count;
        self.matching_ids.extend(later.matching_ids);
        self
    }
}

/// Single pass over `records`.
pub fn evaluate_population(expression: &SegmentExpression, records: &[CustomerRecord]) -> PopulationResult {
    let matching_ids: Vec<String> = records
        .iter()
        .filter(|r| evaluate_expression(expression, r))
        .map(|r| r.customer_id.clone())
        .collect();
    PopulationResult {
        evaluated: records.len(),
        match_count: matching_ids.len(),
        matching_ids,
    }
}

impl SegmentExpression {
    pub fn matches(&self, record: &CustomerRecord) -> bool {
        evaluate_expression(self, record)
    }
}
