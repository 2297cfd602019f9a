//! Customer records as supplied by the external data layer.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{FieldRegistry, FieldType};
use crate::value::TypedValue;

/// One customer's attributes keyed by field id. A field that is missing
/// from `attributes` is absent for evaluation purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub customer_id: String,
    #[serde(default)]
    pub attributes: HashMap<String, TypedValue>,
}

impl CustomerRecord {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, field_id: impl Into<String>, value: TypedValue) -> Self {
        self.attributes.insert(field_id.into(), value);
        self
    }

    pub fn get(&self, field_id: &str) -> Option<&TypedValue> {
        self.attributes.get(field_id)
    }

    /// Builds a record from an untyped JSON object, coercing each value to
    /// its field's declared type. Nulls and unknown keys are skipped; the
    /// ids of values that could not be coerced are returned alongside.
    pub fn from_json_attributes(
        customer_id: impl Into<String>,
        raw: &serde_json::Map<String, serde_json::Value>,
        registry: &FieldRegistry,
    ) -> (Self, Vec<String>) {
        let mut record = Self::new(customer_id);
        let mut rejected = Vec::new();
        for (key, value) in raw {
            if value.is_null() {
                continue;
            }
            let Ok(field) = registry.get_field(key) else {
                continue;
            };
            match coerce(&field.field_type, value) {
                Some(typed) => {
                    record.attributes.insert(key.clone(), typed);
                }
                None => rejected.push(key.clone()),
            }
        }
        rejected.sort();
        (record, rejected)
    }
}

fn coerce(field_type: &FieldType, value: &serde_json::Value) -> Option<TypedValue> {
    use serde_json::Value;
    match (field_type, value) {
        (FieldType::Text | FieldType::Select { .. }, Value::String(s)) => Some(TypedValue::text(s.clone())),
        (FieldType::Number, Value::Number(n)) => n.as_f64().map(TypedValue::number),
        (FieldType::Number, Value::String(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).map(TypedValue::number),
        (FieldType::Boolean, Value::Bool(b)) => Some(TypedValue::boolean(*b)),
        (FieldType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(TypedValue::boolean(true)),
            "false" => Some(TypedValue::boolean(false)),
            _ => None,
        },
        (FieldType::Date, Value::String(s)) => parse_date(s).map(TypedValue::date),
        _ => None,
    }
}

/// RFC 3339 timestamps, or bare `YYYY-MM-DD` dates taken as midnight UTC.
fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_coerce_plain_json() {
        let registry = FieldRegistry::crm_default();
        let raw = serde_json::json!({
            "name": "Ana Silva",
            "orderCount": 12,
            "totalSpent": "349.90",
            "isSubscribed": true,
            "signupDate": "2023-05-01",
            "lastPurchaseDate": "2024-02-10T08:30:00+02:00",
            "tier": "gold",
            "email": null,
            "favouriteColour": "green",
            "age": "unknown"
        });
        let (record, rejected) =
            CustomerRecord::from_json_attributes("c-1", raw.as_object().unwrap(), &registry);

        assert_eq!(record.get("name"), Some(&TypedValue::text("Ana Silva")));
        assert_eq!(record.get("orderCount"), Some(&TypedValue::number(12.0)));
        assert_eq!(record.get("totalSpent"), Some(&TypedValue::number(349.9)));
        assert_eq!(record.get("isSubscribed"), Some(&TypedValue::boolean(true)));
        assert_eq!(
            record.get("signupDate"),
            Some(&TypedValue::date(Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap()))
        );
        assert_eq!(
            record.get("lastPurchaseDate"),
            Some(&TypedValue::date(Utc.with_ymd_and_hms(2024, 2, 10, 6, 30, 0).unwrap()))
        );
        assert!(record.get("email").is_none());
        assert!(record.get("favouriteColour").is_none());
        assert!(record.get("age").is_none());
        assert_eq!(rejected, vec!["age".to_string()]);
    }

    #[test]
    fn test_typed_json_shape() {
        let json = r#"{"customerId": "c-9", "attributes": {"age": {"type": "number", "value": 41}}}"#;
        let record: CustomerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.customer_id, "c-9");
        assert_eq!(record.get("age"), Some(&TypedValue::number(41.0)));
    }
}
