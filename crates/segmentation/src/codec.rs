//! Structural serialization of segment expressions.
//!
//! Encoding is lossless for any expression built through the composer.
//! Decoding validates every condition against the live registry. A
//! condition that no longer fits the registry is quarantined: it keeps
//! its stored form, evaluates to `false`, and is reported as a
//! [`ConfigMismatch`]. Decoding only fails when the payload is not a
//! readable expression document at all.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::condition::FilterCondition;
use crate::error::{SegmentError, SegmentResult};
use crate::expression::{Combinator, ConditionEntry, FilterGroup, QuarantinedCondition, SegmentExpression};
use crate::fields::FieldRegistry;
use crate::operators::Operator;
use crate::value::{TypedValue, ValueKind};

// ─── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedExpression {
    pub groups: Vec<SerializedGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGroup {
    pub id: String,
    pub combinator: Combinator,
    #[serde(default)]
    pub conditions: Vec<SerializedCondition>,
}

/// Values stay as raw JSON here so that a malformed value quarantines one
/// condition instead of rejecting the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedCondition {
    pub id: String,
    pub field_id: String,
    pub operator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_value: Option<serde_json::Value>,
}

// ─── Mismatches ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchReason {
    UnknownField { field: String },
    UnknownOperator { operator: String },
    OperatorNotAllowed { field: String, operator: String },
    TypeMismatch { field: String, expected: ValueKind, found: ValueKind },
    InvalidOption { field: String, value: String },
    SecondValueNotAllowed { operator: String },
    MalformedValue { field: String },
    MalformedId { id: String },
    EmptyExpression,
}

impl std::fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MismatchReason::UnknownField { field } => write!(f, "unknown field '{field}'"),
            MismatchReason::UnknownOperator { operator } => write!(f, "unknown operator '{operator}'"),
            MismatchReason::OperatorNotAllowed { field, operator } => {
                write!(f, "operator '{operator}' not allowed for field '{field}'")
            }
            MismatchReason::TypeMismatch { field, expected, found } => {
                write!(f, "field '{field}' expects {expected}, stored value is {found}")
            }
            MismatchReason::InvalidOption { field, value } => {
                write!(f, "'{value}' is not an option of field '{field}'")
            }
            MismatchReason::SecondValueNotAllowed { operator } => {
                write!(f, "operator '{operator}' does not take a second value")
            }
            MismatchReason::MalformedValue { field } => write!(f, "unreadable value for field '{field}'"),
            MismatchReason::MalformedId { id } => write!(f, "malformed id '{id}'"),
            MismatchReason::EmptyExpression => f.write_str("expression has no groups"),
        }
    }
}

/// A stored condition (or group) that did not fit the live registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMismatch {
    pub group_id: Uuid,
    pub condition_id: Option<Uuid>,
    pub reason: MismatchReason,
}

/// Result of decoding: a usable expression plus everything that had to be
/// quarantined on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub expression: SegmentExpression,
    pub mismatches: Vec<ConfigMismatch>,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

// ─── Encoding ───────────────────────────────────────────────────────────────

pub fn serialize(expression: &SegmentExpression) -> SerializedExpression {
    let groups = expression
        .groups()
        .iter()
        .map(|group| SerializedGroup {
            id: group
                .stored_id()
                .map_or_else(|| group.id().to_string(), str::to_string),
            combinator: group.combinator(),
            conditions: group
                .entries()
                .iter()
                .filter_map(|entry| match entry {
                    ConditionEntry::Active(c) => Some(encode_condition(c)),
                    ConditionEntry::Quarantined(q) => q.raw.clone(),
                })
                .collect(),
        })
        .collect();
    SerializedExpression { groups }
}

pub fn to_json(expression: &SegmentExpression) -> SegmentResult<String> {
    Ok(serde_json::to_string(&serialize(expression))?)
}

fn encode_condition(condition: &FilterCondition) -> SerializedCondition {
    SerializedCondition {
        id: condition.id().to_string(),
        field_id: condition.field_id().to_string(),
        operator_id: condition.operator().id().to_string(),
        value: condition.value().map(encode_value),
        second_value: condition.second_value().map(encode_value),
    }
}

fn encode_value(value: &TypedValue) -> serde_json::Value {
    match value {
        TypedValue::Text(s) => json!({"type": "text", "value": s}),
        TypedValue::Number(n) => json!({"type": "number", "value": n}),
        TypedValue::Boolean(b) => json!({"type": "boolean", "value": b}),
        TypedValue::Date(d) => json!({
            "type": "date",
            "value": d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }),
    }
}

// ─── Decoding ───────────────────────────────────────────────────────────────

pub fn from_json(json: &str, registry: &FieldRegistry) -> SegmentResult<Decoded> {
    let serialized: SerializedExpression = serde_json::from_str(json)?;
    Ok(deserialize(&serialized, registry))
}

pub fn deserialize(serialized: &SerializedExpression, registry: &FieldRegistry) -> Decoded {
    let mut mismatches = Vec::new();

    if serialized.groups.is_empty() {
        // Nothing to evaluate: seed a group that can never match.
        let group_id = Uuid::new_v4();
        let placeholder = QuarantinedCondition {
            id: Uuid::new_v4(),
            raw: None,
            reason: MismatchReason::EmptyExpression,
        };
        note_mismatch(&mut mismatches, group_id, Some(placeholder.id), MismatchReason::EmptyExpression);
        let group = FilterGroup::from_parts(
            group_id,
            Combinator::And,
            vec![ConditionEntry::Quarantined(placeholder)],
        );
        return Decoded {
            expression: SegmentExpression::from_groups(vec![group]),
            mismatches,
        };
    }

    let groups = serialized
        .groups
        .iter()
        .map(|raw_group| {
            let parsed = Uuid::parse_str(&raw_group.id).ok();
            let group_id = match parsed {
                Some(id) => id,
                None => {
                    let minted = Uuid::new_v4();
                    note_mismatch(
                        &mut mismatches,
                        minted,
                        None,
                        MismatchReason::MalformedId {
                            id: raw_group.id.clone(),
                        },
                    );
                    minted
                }
            };
            let entries = raw_group
                .conditions
                .iter()
                .map(|raw| match decode_condition(raw, registry) {
                    Ok(condition) => ConditionEntry::Active(condition),
                    Err((id, reason)) => {
                        note_mismatch(&mut mismatches, group_id, Some(id), reason.clone());
                        ConditionEntry::Quarantined(QuarantinedCondition {
                            id,
                            raw: Some(raw.clone()),
                            reason,
                        })
                    }
                })
                .collect();
            let group = FilterGroup::from_parts(group_id, raw_group.combinator, entries);
            match parsed {
                Some(_) => group,
                None => group.with_stored_id(raw_group.id.as_str()),
            }
        })
        .collect();

    Decoded {
        expression: SegmentExpression::from_groups(groups),
        mismatches,
    }
}

fn note_mismatch(mismatches: &mut Vec<ConfigMismatch>, group_id: Uuid, condition_id: Option<Uuid>, reason: MismatchReason) {
    warn!(%group_id, ?condition_id, %reason, "Segment condition quarantined");
    mismatches.push(ConfigMismatch {
        group_id,
        condition_id,
        reason,
    });
}

fn decode_condition(
    raw: &SerializedCondition,
    registry: &FieldRegistry,
) -> Result<FilterCondition, (Uuid, MismatchReason)> {
    let id = Uuid::parse_str(&raw.id).map_err(|_| {
        (
            Uuid::new_v4(),
            MismatchReason::MalformedId { id: raw.id.clone() },
        )
    })?;
    let fail = |reason| (id, reason);

    registry.get_field(&raw.field_id).map_err(|_| {
        fail(MismatchReason::UnknownField {
            field: raw.field_id.clone(),
        })
    })?;
    let operator = Operator::from_id(&raw.operator_id).ok_or_else(|| {
        fail(MismatchReason::UnknownOperator {
            operator: raw.operator_id.clone(),
        })
    })?;
    let value = decode_value(raw.value.as_ref(), &raw.field_id).map_err(fail)?;
    let second_value = decode_value(raw.second_value.as_ref(), &raw.field_id).map_err(fail)?;

    FilterCondition::from_parts(registry, id, &raw.field_id, operator, value, second_value)
        .map_err(|err| fail(reason_from_error(err, &raw.field_id)))
}

fn decode_value(raw: Option<&serde_json::Value>, field_id: &str) -> Result<Option<TypedValue>, MismatchReason> {
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| MismatchReason::MalformedValue {
                field: field_id.to_string(),
            }),
    }
}

fn reason_from_error(err: SegmentError, field_id: &str) -> MismatchReason {
    match err {
        SegmentError::UnknownField(field) => MismatchReason::UnknownField { field },
        SegmentError::UnknownOperator(operator) => MismatchReason::UnknownOperator { operator },
        SegmentError::OperatorNotAllowedForField { field, operator } => {
            MismatchReason::OperatorNotAllowed { field, operator }
        }
        SegmentError::TypeMismatch { field, expected, found } => {
            MismatchReason::TypeMismatch { field, expected, found }
        }
        SegmentError::InvalidOption { field, value } => MismatchReason::InvalidOption { field, value },
        SegmentError::SecondValueNotAllowed(operator) => MismatchReason::SecondValueNotAllowed {
            operator: operator.id().to_string(),
        },
        _ => MismatchReason::MalformedValue {
            field: field_id.to_string(),
        },
    }
}
