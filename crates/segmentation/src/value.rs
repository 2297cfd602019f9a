//! Typed condition and attribute values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value tagged with its type. Condition values and customer attributes
/// both use this shape; the tag must agree with the field's declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Number,
    Boolean,
    Date,
}

impl TypedValue {
    pub fn text(value: impl Into<String>) -> Self {
        TypedValue::Text(value.into())
    }

    pub fn number(value: f64) -> Self {
        TypedValue::Number(value)
    }

    pub fn boolean(value: bool) -> Self {
        TypedValue::Boolean(value)
    }

    pub fn date(value: DateTime<Utc>) -> Self {
        TypedValue::Date(value)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Text(_) => ValueKind::Text,
            TypedValue::Number(_) => ValueKind::Number,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Date(_) => ValueKind::Date,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tagged_json_shape() {
        let json = serde_json::to_value(TypedValue::number(10.0)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "number", "value": 10.0}));

        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let json = serde_json::to_value(TypedValue::date(date)).unwrap();
        assert_eq!(json["type"], "date");
        assert_eq!(json["value"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(TypedValue::text("a").kind(), ValueKind::Text);
        assert_eq!(TypedValue::boolean(true).kind(), ValueKind::Boolean);
        assert_eq!(TypedValue::text("a").as_text(), Some("a"));
        assert_eq!(TypedValue::number(1.0).as_text(), None);
    }
}
