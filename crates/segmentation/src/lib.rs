//! Customer segmentation filter engine: typed conditions over customer
//! attributes, grouped with AND/OR, evaluated against customer records.

pub mod builder;
pub mod codec;
pub mod condition;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod fields;
pub mod history;
pub mod operators;
pub mod predicates;
pub mod preview;
pub mod record;
pub mod store;
pub mod value;

pub use builder::SegmentBuilder;
pub use codec::{ConfigMismatch, Decoded, MismatchReason, SerializedExpression};
pub use condition::FilterCondition;
pub use engine::SegmentationEngine;
pub use error::{SegmentError, SegmentResult};
pub use evaluator::{evaluate_condition, evaluate_expression, evaluate_group, evaluate_population, PopulationResult};
pub use expression::{Combinator, ConditionEntry, FilterGroup, SegmentExpression};
pub use fields::{FieldDefinition, FieldKind, FieldRegistry, FieldType, RegistryHandle, SelectOption};
pub use history::{ExpressionHistory, ExpressionVersion};
pub use operators::Operator;
pub use preview::{AudiencePreview, PreviewOutcome, PreviewTicket};
pub use record::CustomerRecord;
pub use store::{InMemorySegmentStore, LoadedSegment, SegmentStore, SegmentSummary};
pub use value::{TypedValue, ValueKind};
