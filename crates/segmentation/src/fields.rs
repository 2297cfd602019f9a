//! Field registry: the catalog of segmentable customer attributes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SegmentError, SegmentResult};
use crate::operators::{self, Operator};
use crate::value::{TypedValue, ValueKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Select { options: Vec<SelectOption> },
}

/// Payload-free discriminant of [`FieldType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Boolean,
    Select,
}

impl FieldType {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Text => FieldKind::Text,
            FieldType::Number => FieldKind::Number,
            FieldType::Date => FieldKind::Date,
            FieldType::Boolean => FieldKind::Boolean,
            FieldType::Select { .. } => FieldKind::Select,
        }
    }

    /// Tag a value must carry to be used with this type. Select options
    /// are addressed by their text value.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            FieldType::Text | FieldType::Select { .. } => ValueKind::Text,
            FieldType::Number => ValueKind::Number,
            FieldType::Date => ValueKind::Date,
            FieldType::Boolean => ValueKind::Boolean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    pub display_name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
}

impl FieldDefinition {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            field_type,
        }
    }

    pub fn operators(&self) -> &'static [Operator] {
        operators::operators_for_type(&self.field_type)
    }

    pub fn default_operator(&self) -> Operator {
        operators::default_operator(&self.field_type)
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    /// Checks that `value` may be stored in a condition on this field.
    pub fn check_value(&self, value: &TypedValue) -> SegmentResult<()> {
        let expected = self.field_type.value_kind();
        if value.kind() != expected {
            return Err(SegmentError::TypeMismatch {
                field: self.id.clone(),
                expected,
                found: value.kind(),
            });
        }
        if let TypedValue::Number(n) = value {
            if !n.is_finite() {
                return Err(SegmentError::NonFiniteNumber { field: self.id.clone() });
            }
        }
        if let (FieldType::Select { options }, TypedValue::Text(v)) = (&self.field_type, value) {
            if !options.iter().any(|o| &o.value == v) {
                return Err(SegmentError::InvalidOption {
                    field: self.id.clone(),
                    value: v.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Immutable snapshot of the field catalog. Lookups preserve the order
/// the schema source supplied the fields in.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    pub fn new(fields: Vec<FieldDefinition>) -> SegmentResult<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (pos, field) in fields.iter().enumerate() {
            if index.insert(field.id.clone(), pos).is_some() {
                return Err(SegmentError::DuplicateField(field.id.clone()));
            }
        }
        Ok(Self { fields, index })
    }

    /// Parse a schema document: a JSON array of field definitions.
    pub fn from_json(json: &str) -> SegmentResult<Self> {
        let fields: Vec<FieldDefinition> = serde_json::from_str(json)?;
        Self::new(fields)
    }

    /// The standard CRM customer attributes.
    pub fn crm_default() -> Self {
        let fields = vec![
            FieldDefinition::new("name", "Customer name", FieldType::Text),
            FieldDefinition::new("email", "Email", FieldType::Text),
            FieldDefinition::new("city", "City", FieldType::Text),
            FieldDefinition::new("orderCount", "Order count", FieldType::Number),
            FieldDefinition::new("totalSpent", "Total spent", FieldType::Number),
            FieldDefinition::new("age", "Age", FieldType::Number),
            FieldDefinition::new("lastPurchaseDate", "Last purchase date", FieldType::Date),
            FieldDefinition::new("signupDate", "Signup date", FieldType::Date),
            FieldDefinition::new("isSubscribed", "Subscribed to marketing", FieldType::Boolean),
            FieldDefinition::new("hasAppInstalled", "Has app installed", FieldType::Boolean),
            FieldDefinition::new(
                "tier",
                "Loyalty tier",
                FieldType::Select {
                    options: vec![
                        SelectOption::new("bronze", "Bronze"),
                        SelectOption::new("silver", "Silver"),
                        SelectOption::new("gold", "Gold"),
                        SelectOption::new("platinum", "Platinum"),
                    ],
                },
            ),
            FieldDefinition::new(
                "preferredChannel",
                "Preferred channel",
                FieldType::Select {
                    options: vec![
                        SelectOption::new("email", "Email"),
                        SelectOption::new("sms", "SMS"),
                        SelectOption::new("push", "Push notification"),
                        SelectOption::new("whatsapp", "WhatsApp"),
                    ],
                },
            ),
        ];
        // Ids above are unique.
        let index = fields
            .iter()
            .enumerate()
            .map(|(pos, f)| (f.id.clone(), pos))
            .collect();
        Self { fields, index }
    }

    pub fn get_field(&self, id: &str) -> SegmentResult<&FieldDefinition> {
        self.index
            .get(id)
            .map(|&pos| &self.fields[pos])
            .ok_or_else(|| SegmentError::UnknownField(id.to_string()))
    }

    pub fn operators_for(&self, field_id: &str) -> SegmentResult<&'static [Operator]> {
        self.get_field(field_id).map(FieldDefinition::operators)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Shared pointer to the live registry. Reloading a schema swaps the whole
/// snapshot; readers holding an older snapshot keep a consistent view.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<FieldRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: FieldRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    pub fn snapshot(&self) -> Arc<FieldRegistry> {
        self.current.read().clone()
    }

    pub fn replace(&self, registry: FieldRegistry) {
        let fields = registry.len();
        *self.current.write() = Arc::new(registry);
        info!(fields, "Field registry replaced");
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(FieldRegistry::crm_default())
    }
}
