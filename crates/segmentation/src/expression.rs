//! Segment expressions and the group composer.
//!
//! A [`SegmentExpression`] is an ordered list of [`FilterGroup`]s. Editing
//! never mutates an expression; each composer operation returns a new
//! value so hosts can keep old versions for undo or background work.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::codec::{MismatchReason, SerializedCondition};
use crate::condition::FilterCondition;
use crate::error::{SegmentError, SegmentResult};
use crate::fields::FieldRegistry;
use crate::operators::Operator;
use crate::value::TypedValue;

/// How a group joins the result of all groups before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn flip(self) -> Self {
        match self {
            Combinator::And => Combinator::Or,
            Combinator::Or => Combinator::And,
        }
    }
}

/// A condition that failed validation when a stored segment was loaded.
/// It always evaluates to `false` and keeps its stored form so saving the
/// segment again does not rewrite it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantinedCondition {
    pub id: Uuid,
    pub raw: Option<SerializedCondition>,
    pub reason: MismatchReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEntry {
    Active(FilterCondition),
    Quarantined(QuarantinedCondition),
}

impl ConditionEntry {
    pub fn id(&self) -> Uuid {
        match self {
            ConditionEntry::Active(c) => c.id(),
            ConditionEntry::Quarantined(q) => q.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    id: Uuid,
    combinator: Combinator,
    entries: Vec<ConditionEntry>,
    /// Unparseable id read from storage. Written back verbatim on save.
    stored_id: Option<String>,
}

impl FilterGroup {
    pub fn new(combinator: Combinator) -> Self {
        Self {
            id: Uuid::new_v4(),
            combinator,
            entries: Vec::new(),
            stored_id: None,
        }
    }

    pub(crate) fn from_parts(id: Uuid, combinator: Combinator, entries: Vec<ConditionEntry>) -> Self {
        Self {
            id,
            combinator,
            entries,
            stored_id: None,
        }
    }

    pub(crate) fn with_stored_id(mut self, raw: impl Into<String>) -> Self {
        self.stored_id = Some(raw.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stored_id(&self) -> Option<&str> {
        self.stored_id.as_deref()
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn entries(&self) -> &[ConditionEntry] {
        &self.entries
    }

    /// Active conditions in order, skipping quarantined entries.
    pub fn conditions(&self) -> impl Iterator<Item = &FilterCondition> {
        self.entries.iter().filter_map(|e| match e {
            ConditionEntry::Active(c) => Some(c),
            ConditionEntry::Quarantined(_) => None,
        })
    }

    pub fn condition(&self, condition_id: Uuid) -> Option<&FilterCondition> {
        self.conditions().find(|c| c.id() == condition_id)
    }

    pub fn has_quarantined(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(e, ConditionEntry::Quarantined(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentExpression {
    groups: Vec<FilterGroup>,
}

impl SegmentExpression {
    /// A single empty group. It matches every record until conditions are
    /// added.
    pub fn new() -> Self {
        Self {
            groups: vec![FilterGroup::new(Combinator::And)],
        }
    }

    /// Callers guarantee `groups` is non-empty.
    pub(crate) fn from_groups(groups: Vec<FilterGroup>) -> Self {
        debug_assert!(!groups.is_empty());
        Self { groups }
    }

    pub fn groups(&self) -> &[FilterGroup] {
        &self.groups
    }

    pub fn first_group_id(&self) -> Uuid {
        self.groups[0].id
    }

    pub fn last_group_id(&self) -> Uuid {
        self.groups[self.groups.len() - 1].id
    }

    pub fn group(&self, group_id: Uuid) -> Option<&FilterGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn condition_count(&self) -> usize {
        self.groups.iter().map(FilterGroup::len).sum()
    }

    pub fn quarantined_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .filter(|e| matches!(e, ConditionEntry::Quarantined(_)))
            .count()
    }

    /// Ids of `between` conditions whose range is empty.
    pub fn empty_ranges(&self) -> Vec<Uuid> {
        self.groups
            .iter()
            .flat_map(FilterGroup::conditions)
            .filter(|c| c.is_empty_range())
            .map(FilterCondition::id)
            .collect()
    }

    // ─── Composer ───────────────────────────────────────────────────────

    /// Appends an empty group joined with OR.
    pub fn add_group(&self) -> Self {
        let mut next = self.clone();
        next.groups.push(FilterGroup::new(Combinator::Or));
        next
    }

    pub fn remove_group(&self, group_id: Uuid) -> SegmentResult<Self> {
        let pos = self.group_position(group_id)?;
        if pos == 0 {
            return Err(SegmentError::CannotRemoveFirstGroup);
        }
        let mut next = self.clone();
        next.groups.remove(pos);
        Ok(next)
    }

    /// Flips AND/OR on a group. The first group's combinator never takes
    /// part in evaluation, so toggling it returns the expression unchanged.
    pub fn toggle_combinator(&self, group_id: Uuid) -> SegmentResult<Self> {
        let pos = self.group_position(group_id)?;
        if pos == 0 {
            debug!(%group_id, "Ignoring combinator toggle on first group");
            return Ok(self.clone());
        }
        let mut next = self.clone();
        let group = &mut next.groups[pos];
        group.combinator = group.combinator.flip();
        Ok(next)
    }

    /// Appends a fresh condition on `field_id` to a group.
    pub fn add_condition(
        &self,
        registry: &FieldRegistry,
        group_id: Uuid,
        field_id: &str,
    ) -> SegmentResult<Self> {
        let condition = FilterCondition::new(registry, field_id)?;
        self.push_condition(group_id, condition)
    }

    /// Appends an already-built condition to a group.
    pub fn push_condition(&self, group_id: Uuid, condition: FilterCondition) -> SegmentResult<Self> {
        let pos = self.group_position(group_id)?;
        let mut next = self.clone();
        next.groups[pos]
            .entries
            .push(ConditionEntry::Active(condition));
        Ok(next)
    }

    /// Removes a condition, active or quarantined.
    pub fn remove_condition(&self, group_id: Uuid, condition_id: Uuid) -> SegmentResult<Self> {
        let (g, c) = self.entry_position(group_id, condition_id)?;
        let mut next = self.clone();
        next.groups[g].entries.remove(c);
        Ok(next)
    }

    /// Replaces a condition with `f(condition)`. Quarantined conditions
    /// cannot be edited.
    pub fn update_condition<F>(&self, group_id: Uuid, condition_id: Uuid, f: F) -> SegmentResult<Self>
    where
        F: FnOnce(&FilterCondition) -> SegmentResult<FilterCondition>,
    {
        let (g, c) = self.entry_position(group_id, condition_id)?;
        let updated = match &self.groups[g].entries[c] {
            ConditionEntry::Active(condition) => f(condition)?,
            ConditionEntry::Quarantined(q) => return Err(SegmentError::ConditionQuarantined(q.id)),
        };
        let mut next = self.clone();
        next.groups[g].entries[c] = ConditionEntry::Active(updated);
        Ok(next)
    }

    pub fn set_field(
        &self,
        registry: &FieldRegistry,
        group_id: Uuid,
        condition_id: Uuid,
        field_id: &str,
    ) -> SegmentResult<Self> {
        self.update_condition(group_id, condition_id, |c| c.with_field(registry, field_id))
    }

    pub fn set_operator(
        &self,
        registry: &FieldRegistry,
        group_id: Uuid,
        condition_id: Uuid,
        operator: Operator,
    ) -> SegmentResult<Self> {
        self.update_condition(group_id, condition_id, |c| c.with_operator(registry, operator))
    }

    pub fn set_value(
        &self,
        registry: &FieldRegistry,
        group_id: Uuid,
        condition_id: Uuid,
        value: TypedValue,
    ) -> SegmentResult<Self> {
        self.update_condition(group_id, condition_id, |c| c.with_value(registry, value))
    }

    pub fn set_second_value(
        &self,
        registry: &FieldRegistry,
        group_id: Uuid,
        condition_id: Uuid,
        value: TypedValue,
    ) -> SegmentResult<Self> {
        self.update_condition(group_id, condition_id, |c| c.with_second_value(registry, value))
    }

    fn group_position(&self, group_id: Uuid) -> SegmentResult<usize> {
        self.groups
            .iter()
            .position(|g| g.id == group_id)
            .ok_or(SegmentError::UnknownGroup(group_id))
    }

    fn entry_position(&self, group_id: Uuid, condition_id: Uuid) -> SegmentResult<(usize, usize)> {
        let g = self.group_position(group_id)?;
        let c = self.groups[g]
            .entries
            .iter()
            .position(|e| e.id() == condition_id)
            .ok_or(SegmentError::UnknownCondition(condition_id))?;
        Ok((g, c))
    }
}

impl Default for SegmentExpression {
    fn default() -> Self {
        Self::new()
    }
}
