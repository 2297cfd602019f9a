use thiserror::Error;
use uuid::Uuid;

use crate::operators::Operator;
use crate::value::ValueKind;

pub type SegmentResult<T> = Result<T, SegmentError>;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Operator '{operator}' is not allowed for field '{field}'")]
    OperatorNotAllowedForField { field: String, operator: String },

    #[error("Type mismatch on field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Field '{field}' only accepts finite numbers")]
    NonFiniteNumber { field: String },

    #[error("Operator '{0}' takes a single value")]
    SecondValueNotAllowed(Operator),

    #[error("Value '{value}' is not an option of field '{field}'")]
    InvalidOption { field: String, value: String },

    #[error("The first group of a segment cannot be removed")]
    CannotRemoveFirstGroup,

    #[error("Unknown group: {0}")]
    UnknownGroup(Uuid),

    #[error("Unknown condition: {0}")]
    UnknownCondition(Uuid),

    #[error("Condition {0} is quarantined and can only be removed")]
    ConditionQuarantined(Uuid),

    #[error("Duplicate field definition: {0}")]
    DuplicateField(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preview task failed: {0}")]
    PreviewTask(String),
}
